use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub(crate) fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    New,
    Running,
    Scanned,
    Decided,
    Deleting,
    Deleted,
    Cancelled,
    Failed,
}

/// A duplicate group as handed to the session manager. Deliberately a local
/// shape rather than a re-export of the hashing crate's type, so C8 has no
/// compile-time dependency on C4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub digest: String,
    pub size: u64,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivorLock {
    pub path: PathBuf,
    pub reason: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteIntent {
    pub path: PathBuf,
    pub reason: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionResult {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub roots: Vec<PathBuf>,
    pub metadata: serde_json::Value,
    pub state: ScanState,
    pub created_at: f64,
    pub updated_at: f64,

    pub groups: Vec<GroupSnapshot>,
    pub delete_plan: Option<serde_json::Value>,

    pub survivor_locks: std::collections::BTreeMap<String, SurvivorLock>,
    pub delete_intents: std::collections::BTreeMap<String, DeleteIntent>,

    pub deletion_result: Option<DeletionResult>,

    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

impl ScanRecord {
    pub(crate) fn new(scan_id: String, roots: Vec<PathBuf>, metadata: serde_json::Value) -> Self {
        let now = now_secs();
        ScanRecord {
            scan_id,
            roots,
            metadata,
            state: ScanState::Running,
            created_at: now,
            updated_at: now,
            groups: Vec::new(),
            delete_plan: None,
            survivor_locks: std::collections::BTreeMap::new(),
            delete_intents: std::collections::BTreeMap::new(),
            deletion_result: None,
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Summary row returned by `list_scans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub state: ScanState,
    pub created_at: f64,
    pub updated_at: f64,
    pub roots: Vec<PathBuf>,
    pub group_count: usize,
    pub has_plan: bool,
}

/// A plan assembled from UI intents rather than from an explicit caller-built
/// plan. Not part of the minimal spec surface, but present in the system this
/// was distilled from and cheap to keep: the UI only ever deals in intents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePlanItem {
    pub path: PathBuf,
    pub reason: String,
    pub survivor: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePlan {
    pub token: String,
    pub policy: String,
    pub items: Vec<EffectivePlanItem>,
}
