use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeletionError {
    /// Plan validation failed before any file was touched. Carries every
    /// violation found, not just the first, mirroring the all-or-nothing
    /// abort semantics: the whole plan is rejected, no partial execution.
    #[error("deletion plan validation failed: {0}")]
    InvalidPlan(String),
}

pub type DeletionResult<T> = Result<T, DeletionError>;
