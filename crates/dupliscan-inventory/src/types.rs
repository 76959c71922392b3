use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Lifecycle of a scan as recorded in the inventory store. Mirrors the
/// orchestrator's own state machine but flattened to the statuses worth
/// persisting across a process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    InProgress,
    Scanned,
    Decided,
    Deleting,
    Deleted,
    Cancelled,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Deleted | ScanStatus::Cancelled | ScanStatus::Failed
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Scanned => "scanned",
            ScanStatus::Decided => "decided",
            ScanStatus::Deleting => "deleting",
            ScanStatus::Deleted => "deleted",
            ScanStatus::Cancelled => "cancelled",
            ScanStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ScanStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "in_progress" => ScanStatus::InProgress,
            "scanned" => ScanStatus::Scanned,
            "decided" => ScanStatus::Decided,
            "deleting" => ScanStatus::Deleting,
            "deleted" => ScanStatus::Deleted,
            "cancelled" => ScanStatus::Cancelled,
            "failed" => ScanStatus::Failed,
            other => return Err(InventoryError::UnknownStatus(other.to_string())),
        })
    }
}

/// A row read back from the `scans` table.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryScanState {
    pub scan_id: String,
    pub status: ScanStatus,
    pub last_phase: String,
    pub created_ts: f64,
    pub updated_ts: f64,
    pub roots: Vec<String>,
    pub file_count: u64,
}

/// A discovered file record as persisted to (and loaded from) the `files`
/// table. Holds no content, only the triple needed to detect changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFileRecord {
    pub path: String,
    pub size: u64,
    pub mtime_ns: i64,
}
