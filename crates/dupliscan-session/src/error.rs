use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session record corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// Per spec: an unknown `scan_id` reaching the lifecycle API is a
    /// programming bug, not a recoverable condition. Callers that know the
    /// id was just created may `.expect()` on this.
    #[error("unknown scan_id: {0}")]
    UnknownScan(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
