use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit record encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
