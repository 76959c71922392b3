use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current on-disk schema version. Bump this and extend `migrate_record`
/// when the record shape changes; old files are never rewritten in place.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStatus {
    Deleted,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionDetail {
    pub path: PathBuf,
    pub group_index: u32,
    pub kept_path: PathBuf,
    pub bytes: u64,
    pub mtime: f64,
    pub status: DetailStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One append-only deletion audit record, keyed under its UTC date's JSONL
/// file. Schema-versioned so older lines can be migrated on read without
/// ever being rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub scan_id: String,
    pub timestamp: f64,
    pub mode: String,
    pub groups: u32,
    pub deleted: u32,
    pub failed: u32,
    pub bytes_reclaimed: u64,
    pub source: String,
    #[serde(default)]
    pub policy: serde_json::Value,
    #[serde(default)]
    pub details: Vec<DeletionDetail>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    // A line with no `schema_version` field predates versioning entirely.
    0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateWindow {
    pub days: u32,
    pub total_deleted: u64,
    pub total_failed: u64,
    pub total_bytes_reclaimed: u64,
    pub by_mode: std::collections::BTreeMap<String, u64>,
    pub by_source: std::collections::BTreeMap<String, u64>,
}
