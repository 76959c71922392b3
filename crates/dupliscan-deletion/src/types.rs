use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionMode {
    Trash,
    Permanent,
}

impl DeletionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionMode::Trash => "trash",
            DeletionMode::Permanent => "permanent",
        }
    }
}

/// UI intent: one keeper plus candidates to delete, per duplicate group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGroup {
    pub group_index: u32,
    pub keep: PathBuf,
    pub delete: Vec<PathBuf>,
}

/// The `policy` object in the wire plan: just the deletion mode today, but
/// kept as its own struct (rather than flattening `mode` onto `DeletePlan`)
/// since that's the shape the UI layer actually sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionPolicy {
    pub mode: DeletionMode,
}

/// The raw plan handed in by the UI layer, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePlan {
    pub scan_id: String,
    pub policy: DeletionPolicy,
    pub groups: Vec<PlanGroup>,
    pub source: String,
}

/// A single delete candidate enriched with the stat snapshot observed at
/// validation time.
#[derive(Debug, Clone)]
pub struct ExecutableOperation {
    pub path: PathBuf,
    pub size: u64,
    pub group_index: u32,
    pub kept_path: PathBuf,
    pub mtime: f64,
}

/// Plan enriched and ready for execution: validation has already run and
/// cannot fail again.
#[derive(Debug, Clone)]
pub struct ExecutablePlan {
    pub scan_id: String,
    pub mode: DeletionMode,
    pub operations: Vec<ExecutableOperation>,
    pub source: String,
}

impl ExecutablePlan {
    pub fn total_bytes(&self) -> u64 {
        self.operations.iter().map(|op| op.size).sum()
    }

    pub fn total_files(&self) -> usize {
        self.operations.len()
    }
}

/// Outcome of a single file's deletion attempt.
#[derive(Debug, Clone)]
pub struct SingleDeletionOutcome {
    pub path: PathBuf,
    pub bytes_reclaimed: u64,
    pub error: Option<String>,
}

impl SingleDeletionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Plan-level execution result.
#[derive(Debug, Clone)]
pub struct BatchDeletionResult {
    pub scan_id: String,
    pub mode: DeletionMode,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub bytes_reclaimed: u64,
}
