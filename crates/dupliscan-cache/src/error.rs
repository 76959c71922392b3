use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
