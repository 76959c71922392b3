use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown scan id: {0}")]
    UnknownScan(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
