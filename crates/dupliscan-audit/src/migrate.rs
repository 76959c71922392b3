use crate::types::{AuditRecord, CURRENT_SCHEMA_VERSION};

/// Raises a raw JSON line to the current record shape. Deserialization
/// already supplies documented defaults for fields introduced after schema
/// version 0 (see `#[serde(default = ...)]` on [`AuditRecord`]); this is the
/// seam where a future schema bump adds an explicit field rename or
/// reshaping step, one match arm per version, without ever rewriting the
/// file on disk.
pub fn migrate_record(raw: serde_json::Value) -> Result<AuditRecord, serde_json::Error> {
    let mut record: AuditRecord = serde_json::from_value(raw)?;
    if record.schema_version < CURRENT_SCHEMA_VERSION {
        record.schema_version = CURRENT_SCHEMA_VERSION;
    }
    Ok(record)
}
