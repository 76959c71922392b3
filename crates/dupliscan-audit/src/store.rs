use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use chrono::Utc;
use tracing::warn;

use crate::error::AuditResult;
use crate::migrate::migrate_record;
use crate::types::{AggregateWindow, AuditRecord, CURRENT_SCHEMA_VERSION};

static CORRUPT_LINE_WARNED: Once = Once::new();

/// Append-only JSONL audit store, one file per UTC calendar date.
pub struct AuditLog {
    root_dir: PathBuf,
}

impl AuditLog {
    pub fn open(root_dir: PathBuf) -> Self {
        AuditLog { root_dir }
    }

    fn path_for(&self, date: chrono::NaiveDate) -> PathBuf {
        self.root_dir
            .join(format!("deletions_{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Appends one record to today's (UTC) file. Atomic: the whole body
    /// (prior lines plus the new one) is written to a temp file, fsync'd,
    /// then renamed into place.
    pub fn append(&self, record: &AuditRecord) -> AuditResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        let today = Utc::now().date_naive();
        let final_path = self.path_for(today);

        let mut body = if final_path.exists() {
            fs::read_to_string(&final_path)?
        } else {
            String::new()
        };
        let mut record = record.clone();
        record.schema_version = CURRENT_SCHEMA_VERSION;
        body.push_str(&serde_json::to_string(&record)?);
        body.push('\n');

        let temp_path = final_path.with_extension("jsonl.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(body.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }

    /// All dated JSONL files under the store, oldest first (the date is
    /// embedded in the filename, so lexical order is chronological order).
    fn dated_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("deletions_") && n.ends_with(".jsonl"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    fn read_all(&self) -> Vec<AuditRecord> {
        let mut records = Vec::new();
        for path in self.dated_files() {
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            for line in contents.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(line)
                    .and_then(migrate_record)
                {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        CORRUPT_LINE_WARNED.call_once(|| {
                            warn!(path = %path.display(), error = %e, "skipping corrupt audit line(s)");
                        });
                    }
                }
            }
        }
        records
    }

    /// Filters by scan id, source, and/or a "since" timestamp, newest first,
    /// capped at `limit`.
    pub fn query(
        &self,
        scan_id: Option<&str>,
        source: Option<&str>,
        since_ts: Option<f64>,
        limit: usize,
    ) -> Vec<AuditRecord> {
        let mut records: Vec<AuditRecord> = self
            .read_all()
            .into_iter()
            .filter(|r| scan_id.map(|s| r.scan_id == s).unwrap_or(true))
            .filter(|r| source.map(|s| r.source == s).unwrap_or(true))
            .filter(|r| since_ts.map(|t| r.timestamp >= t).unwrap_or(true))
            .collect();
        records.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap());
        records.truncate(limit);
        records
    }

    /// Totals over the last `days` days, grouped by mode and source.
    pub fn aggregate(&self, days: u32) -> AggregateWindow {
        let cutoff = (Utc::now() - chrono::Duration::days(days as i64)).timestamp() as f64;
        let mut window = AggregateWindow {
            days,
            ..Default::default()
        };
        for record in self.read_all().into_iter().filter(|r| r.timestamp >= cutoff) {
            window.total_deleted += record.deleted as u64;
            window.total_failed += record.failed as u64;
            window.total_bytes_reclaimed += record.bytes_reclaimed;
            *window.by_mode.entry(record.mode.clone()).or_insert(0) += record.deleted as u64;
            *window.by_source.entry(record.source.clone()).or_insert(0) += record.deleted as u64;
        }
        window
    }

    /// Exports `records` to a single JSON array, written atomically.
    pub fn export_json<F>(&self, dest: &Path, records: &[AuditRecord], mut progress: F) -> AuditResult<()>
    where
        F: FnMut(usize, usize),
    {
        let total = records.len();
        let mut items = Vec::with_capacity(total);
        for (i, record) in records.iter().enumerate() {
            items.push(serde_json::to_value(record)?);
            progress(i + 1, total);
        }
        write_atomic(dest, serde_json::to_vec_pretty(&items)?.as_slice())
    }

    /// Exports `records` as CSV, written atomically.
    pub fn export_csv<F>(&self, dest: &Path, records: &[AuditRecord], mut progress: F) -> AuditResult<()>
    where
        F: FnMut(usize, usize),
    {
        let total = records.len();
        let mut body = String::from("scan_id,timestamp,mode,groups,deleted,failed,bytes_reclaimed,source\n");
        for (i, record) in records.iter().enumerate() {
            body.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                csv_field(&record.scan_id),
                record.timestamp,
                csv_field(&record.mode),
                record.groups,
                record.deleted,
                record.failed,
                record.bytes_reclaimed,
                csv_field(&record.source),
            ));
            progress(i + 1, total);
        }
        write_atomic(dest, body.as_bytes())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_atomic(dest: &Path, body: &[u8]) -> AuditResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = dest.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeletionDetail, DetailStatus};

    fn sample(scan_id: &str, source: &str, timestamp: f64) -> AuditRecord {
        AuditRecord {
            scan_id: scan_id.to_string(),
            timestamp,
            mode: "trash".to_string(),
            groups: 1,
            deleted: 1,
            failed: 0,
            bytes_reclaimed: 100,
            source: source.to_string(),
            policy: serde_json::json!({"mode": "trash"}),
            details: vec![DeletionDetail {
                path: PathBuf::from("/a"),
                group_index: 0,
                kept_path: PathBuf::from("/b"),
                bytes: 100,
                mtime: 0.0,
                status: DetailStatus::Deleted,
                error: None,
            }],
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    #[test]
    fn append_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().to_path_buf());
        log.append(&sample("s1", "cli", 1000.0)).unwrap();
        log.append(&sample("s2", "ui", 2000.0)).unwrap();

        let all = log.query(None, None, None, 100);
        assert_eq!(all.len(), 2);

        let by_scan = log.query(Some("s1"), None, None, 100);
        assert_eq!(by_scan.len(), 1);
        assert_eq!(by_scan[0].scan_id, "s1");
    }

    #[test]
    fn query_respects_limit_and_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().to_path_buf());
        for i in 0..5 {
            log.append(&sample(&format!("s{i}"), "cli", i as f64)).unwrap();
        }
        let top = log.query(None, None, None, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].scan_id, "s4");
    }

    #[test]
    fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().to_path_buf());
        log.append(&sample("s1", "cli", 1.0)).unwrap();

        let today = Utc::now().date_naive();
        let path = log.path_for(today);
        let mut body = fs::read_to_string(&path).unwrap();
        body.push_str("{not valid json\n");
        fs::write(&path, body).unwrap();

        let all = log.query(None, None, None, 100);
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn export_json_is_readable_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().to_path_buf());
        let records = vec![sample("s1", "cli", 1.0)];
        let dest = dir.path().join("export.json");
        log.export_json(&dest, &records, |_, _| {}).unwrap();
        let reloaded: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&dest).unwrap()).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn aggregate_sums_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().to_path_buf());
        let now = Utc::now().timestamp() as f64;
        log.append(&sample("s1", "cli", now)).unwrap();
        let window = log.aggregate(30);
        assert_eq!(window.total_deleted, 1);
        assert_eq!(window.by_source.get("cli"), Some(&1));
    }
}
