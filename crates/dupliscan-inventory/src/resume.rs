use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dupliscan_core::ScanConfig;
use serde::{Deserialize, Serialize};

use crate::error::InventoryResult;

/// On-disk record allowing a cancelled or interrupted scan to be restarted
/// from its last inventory checkpoint. At most one payload exists on disk
/// at a time: writing one replaces whatever was there, and a scan that
/// reaches a terminal state clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub scan_id: String,
    pub config: ScanConfig,
    pub inventory_db_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub timestamp: f64,
}

/// Default location for the single resume payload file.
pub fn default_resume_payload_path() -> PathBuf {
    home_dir().join(".cerebro").join("history").join("resume_payload.json")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Reads, writes, and clears the single on-disk [`ResumePayload`].
pub struct ResumeStore {
    path: PathBuf,
}

impl ResumeStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        ResumeStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces whatever payload is currently on disk. Atomic: write to a
    /// sibling temp file, fsync, then rename into place.
    pub fn save(&self, payload: &ResumePayload) -> InventoryResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(payload)?;
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Loads the current payload, or `None` if there isn't one (including
    /// when the file is present but unreadable/corrupt).
    pub fn load(&self) -> Option<ResumePayload> {
        let bytes = fs::read(&self.path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Removes the payload, if any. A missing file is not an error: the
    /// "zero or one active payload" invariant is already satisfied.
    pub fn clear(&self) -> InventoryResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(scan_id: &str) -> ResumePayload {
        ResumePayload {
            scan_id: scan_id.to_string(),
            config: ScanConfig {
                roots: vec![PathBuf::from("/tmp/root")],
                ..ScanConfig::default()
            },
            inventory_db_path: PathBuf::from("/tmp/inventory.sqlite3"),
            checkpoint_path: PathBuf::from("/tmp/checkpoint"),
            timestamp: 1234.0,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path().join("resume_payload.json"));
        assert!(store.load().is_none());

        store.save(&payload("scan-1")).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.scan_id, "scan-1");
        assert_eq!(loaded.config.roots, vec![PathBuf::from("/tmp/root")]);
    }

    #[test]
    fn saving_again_replaces_the_single_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path().join("resume_payload.json"));
        store.save(&payload("scan-1")).unwrap();
        store.save(&payload("scan-2")).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.scan_id, "scan-2");
    }

    #[test]
    fn clear_removes_the_payload_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResumeStore::open(dir.path().join("resume_payload.json"));
        store.save(&payload("scan-1")).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        // Clearing again (nothing left to remove) is not an error.
        store.clear().unwrap();
    }

    #[test]
    fn corrupt_payload_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume_payload.json");
        fs::write(&path, b"{not valid json").unwrap();
        let store = ResumeStore::open(path);
        assert!(store.load().is_none());
    }
}
