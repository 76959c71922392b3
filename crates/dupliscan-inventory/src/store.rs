use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension};

use crate::error::InventoryResult;
use crate::types::{DiscoveredFileRecord, InventoryScanState, ScanStatus};

/// Resumable, SQLite-backed index of in-flight and recently completed scans.
///
/// Unlike the hash cache, the inventory store does not keep a connection
/// open per thread: every mutating call opens and closes its own
/// connection, so a crash mid-scan leaves only committed transactions
/// behind and no dangling file handle.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    db_path: PathBuf,
}

impl InventoryStore {
    pub fn open(db_path: impl Into<PathBuf>) -> InventoryResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = InventoryStore { db_path };
        // Validate the schema eagerly so callers see setup failures up front.
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> InventoryResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000i64)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scans (
                scan_id    TEXT PRIMARY KEY,
                status     TEXT NOT NULL,
                last_phase TEXT NOT NULL,
                created_ts REAL NOT NULL,
                updated_ts REAL NOT NULL,
                roots      TEXT NOT NULL,
                file_count INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS files (
                scan_id  TEXT NOT NULL,
                path     TEXT NOT NULL,
                size     INTEGER NOT NULL,
                mtime_ns INTEGER NOT NULL,
                PRIMARY KEY (scan_id, path)
             );
             CREATE INDEX IF NOT EXISTS idx_files_scan_id ON files(scan_id);",
        )?;
        Ok(conn)
    }

    fn now() -> f64 {
        chrono::Utc::now().timestamp_millis() as f64 / 1000.0
    }

    /// Idempotently register a scan and its roots with status `in_progress`
    /// and phase `init`.
    pub fn begin_scan(&self, scan_id: &str, roots: &[impl AsRef<Path>]) -> InventoryResult<()> {
        let roots_str = roots
            .iter()
            .map(|r| r.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        let now = Self::now();
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR REPLACE INTO scans
               (scan_id, status, last_phase, created_ts, updated_ts, roots, file_count)
             VALUES (?1, 'in_progress', 'init', ?2, ?2, ?3, 0)",
            rusqlite::params![scan_id, now, roots_str],
        )?;
        Ok(())
    }

    /// Replace the discovered-file set for `scan_id` and advance phase to
    /// `discover`. One committed transaction; no partial writes are visible.
    pub fn record_discovery(
        &self,
        scan_id: &str,
        files: &[DiscoveredFileRecord],
    ) -> InventoryResult<()> {
        let now = Self::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM files WHERE scan_id = ?1", [scan_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO files (scan_id, path, size, mtime_ns) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for f in files {
                stmt.execute(rusqlite::params![scan_id, f.path, f.size as i64, f.mtime_ns])?;
            }
        }
        tx.execute(
            "INSERT INTO scans (scan_id, status, last_phase, created_ts, updated_ts, roots, file_count)
             VALUES (
                ?1,
                COALESCE((SELECT status FROM scans WHERE scan_id = ?1), 'in_progress'),
                'discover',
                COALESCE((SELECT created_ts FROM scans WHERE scan_id = ?1), ?2),
                ?2,
                COALESCE((SELECT roots FROM scans WHERE scan_id = ?1), ''),
                ?3
             )
             ON CONFLICT(scan_id) DO UPDATE SET
                last_phase = 'discover',
                updated_ts = excluded.updated_ts,
                file_count = excluded.file_count",
            rusqlite::params![scan_id, now, files.len() as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_scan_state(&self, scan_id: &str) -> InventoryResult<Option<InventoryScanState>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT scan_id, status, last_phase, created_ts, updated_ts, roots, file_count
                 FROM scans WHERE scan_id = ?1",
                [scan_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, f64>(3)?,
                        r.get::<_, f64>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, i64>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((scan_id, status, last_phase, created_ts, updated_ts, roots, file_count)) = row
        else {
            return Ok(None);
        };

        let roots = if roots.is_empty() {
            Vec::new()
        } else {
            roots.split('\n').map(str::to_string).collect()
        };

        Ok(Some(InventoryScanState {
            scan_id,
            status: ScanStatus::from_str(&status)?,
            last_phase,
            created_ts,
            updated_ts,
            roots,
            file_count: file_count.max(0) as u64,
        }))
    }

    /// Returns `(path, size, mtime_ns)` triples ordered case-insensitively
    /// by path.
    pub fn load_discovered_files(&self, scan_id: &str) -> InventoryResult<Vec<DiscoveredFileRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT path, size, mtime_ns FROM files WHERE scan_id = ?1 ORDER BY path COLLATE NOCASE",
        )?;
        let rows = stmt
            .query_map([scan_id], |r| {
                Ok(DiscoveredFileRecord {
                    path: r.get(0)?,
                    size: r.get::<_, i64>(1)? as u64,
                    mtime_ns: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Advance a scan's status/phase without touching its file set.
    pub fn set_status(&self, scan_id: &str, status: ScanStatus, phase: &str) -> InventoryResult<()> {
        let now = Self::now();
        let conn = self.connect()?;
        conn.execute(
            "UPDATE scans SET status = ?2, last_phase = ?3, updated_ts = ?4 WHERE scan_id = ?1",
            rusqlite::params![scan_id, status.to_string(), phase, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, InventoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::open(dir.path().join("inventory.sqlite3")).unwrap();
        (dir, store)
    }

    #[test]
    fn begin_scan_is_idempotent() {
        let (_dir, store) = store();
        store.begin_scan("scan-1", &["/tmp/a", "/tmp/b"]).unwrap();
        store.begin_scan("scan-1", &["/tmp/a", "/tmp/b"]).unwrap();

        let state = store.get_scan_state("scan-1").unwrap().unwrap();
        assert_eq!(state.status, ScanStatus::InProgress);
        assert_eq!(state.last_phase, "init");
        assert_eq!(state.roots, vec!["/tmp/a".to_string(), "/tmp/b".to_string()]);
    }

    #[test]
    fn record_discovery_replaces_file_set_and_advances_phase() {
        let (_dir, store) = store();
        store.begin_scan("scan-2", &["/tmp/root"]).unwrap();

        let files = vec![
            DiscoveredFileRecord { path: "/tmp/root/b.txt".into(), size: 10, mtime_ns: 1 },
            DiscoveredFileRecord { path: "/tmp/root/a.txt".into(), size: 20, mtime_ns: 2 },
        ];
        store.record_discovery("scan-2", &files).unwrap();

        let state = store.get_scan_state("scan-2").unwrap().unwrap();
        assert_eq!(state.last_phase, "discover");
        assert_eq!(state.file_count, 2);

        let loaded = store.load_discovered_files("scan-2").unwrap();
        assert_eq!(loaded.len(), 2);
        // case-insensitive path order
        assert_eq!(loaded[0].path, "/tmp/root/a.txt");
        assert_eq!(loaded[1].path, "/tmp/root/b.txt");
    }

    #[test]
    fn second_discovery_call_replaces_rather_than_appends() {
        let (_dir, store) = store();
        store.begin_scan("scan-3", &["/tmp/root"]).unwrap();
        store
            .record_discovery(
                "scan-3",
                &[DiscoveredFileRecord { path: "/tmp/root/old.txt".into(), size: 1, mtime_ns: 1 }],
            )
            .unwrap();
        store
            .record_discovery(
                "scan-3",
                &[DiscoveredFileRecord { path: "/tmp/root/new.txt".into(), size: 2, mtime_ns: 2 }],
            )
            .unwrap();

        let loaded = store.load_discovered_files("scan-3").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].path, "/tmp/root/new.txt");
    }

    #[test]
    fn unknown_scan_state_is_none() {
        let (_dir, store) = store();
        assert!(store.get_scan_state("nonexistent").unwrap().is_none());
    }

    #[test]
    fn set_status_marks_terminal_state() {
        let (_dir, store) = store();
        store.begin_scan("scan-4", &["/tmp/root"]).unwrap();
        store.set_status("scan-4", ScanStatus::Cancelled, "hashing").unwrap();

        let state = store.get_scan_state("scan-4").unwrap().unwrap();
        assert_eq!(state.status, ScanStatus::Cancelled);
        assert!(state.status.is_terminal());
    }
}
