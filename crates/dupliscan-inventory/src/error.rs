use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("inventory IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("inventory database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown scan status {0:?}")]
    UnknownStatus(String),

    #[error("resume payload serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
