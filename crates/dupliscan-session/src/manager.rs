use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{SessionError, SessionResult};
use crate::types::{
    now_secs, DeleteIntent, DeletionResult, EffectivePlan, EffectivePlanItem, GroupSnapshot,
    ScanRecord, ScanState, ScanSummary, SurvivorLock,
};

struct State {
    scans: HashMap<String, ScanRecord>,
    current_scan_id: Option<String>,
}

/// Per-scan in-memory records with a crash-resilient on-disk mirror: one JSON
/// file per scan id under `persist_path`. A single lock serializes every
/// mutation; there is no call path inside this crate that re-enters it on the
/// same thread, so a plain mutex (rather than a reentrant one) is sufficient.
pub struct SessionManager {
    state: Mutex<State>,
    persist_path: PathBuf,
}

fn default_persist_path() -> PathBuf {
    dirs_home().join(".cerebro").join("sessions")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl SessionManager {
    /// Opens a session manager rooted at `persist_path` (or the default
    /// `~/.cerebro/sessions`), eagerly reloading any previously persisted
    /// scan records.
    pub fn open(persist_path: Option<PathBuf>) -> SessionResult<Self> {
        let persist_path = persist_path.unwrap_or_else(default_persist_path);
        let scans = load_persisted(&persist_path)?;
        Ok(SessionManager {
            state: Mutex::new(State {
                scans,
                current_scan_id: None,
            }),
            persist_path,
        })
    }

    // ---------------------------------------------------------------
    // Lifecycle API (pipeline writes)
    // ---------------------------------------------------------------

    pub fn begin_scan(&self, scan_id: &str, roots: Vec<PathBuf>, metadata: serde_json::Value) {
        let record = ScanRecord::new(scan_id.to_string(), roots, metadata);
        let mut state = self.state.lock();
        self.persist(&record);
        state.scans.insert(scan_id.to_string(), record);
        state.current_scan_id = Some(scan_id.to_string());
    }

    pub fn set_groups(&self, scan_id: &str, groups: Vec<GroupSnapshot>) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        record.groups = groups;
        record.state = ScanState::Scanned;
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    pub fn set_delete_plan(&self, scan_id: &str, plan: serde_json::Value) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        record.delete_plan = Some(plan);
        record.state = ScanState::Decided;
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    pub fn record_deleted(
        &self,
        scan_id: &str,
        deleted: Vec<PathBuf>,
        failed: Vec<(PathBuf, String)>,
    ) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        record.deletion_result = Some(DeletionResult {
            deleted,
            failed,
            timestamp: now_secs(),
        });
        record.state = ScanState::Deleted;
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    pub fn mark_deleting(&self, scan_id: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.scans.get_mut(scan_id) {
            record.state = ScanState::Deleting;
            record.updated_at = now_secs();
        }
    }

    pub fn mark_cancelled(&self, scan_id: &str, reason: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.scans.get_mut(scan_id) {
            record.state = ScanState::Cancelled;
            record.updated_at = now_secs();
            if !reason.is_empty() {
                record.notes.push(format!("Cancelled: {reason}"));
            }
            self.persist(record);
        }
    }

    pub fn mark_failed(&self, scan_id: &str, error: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.scans.get_mut(scan_id) {
            record.state = ScanState::Failed;
            record.updated_at = now_secs();
            if !error.is_empty() {
                record.notes.push(format!("Failed: {error}"));
            }
            self.persist(record);
        }
    }

    // ---------------------------------------------------------------
    // Query API (UI reads)
    // ---------------------------------------------------------------

    pub fn current_scan_id(&self) -> Option<String> {
        self.state.lock().current_scan_id.clone()
    }

    pub fn list_scans(&self, limit: usize) -> Vec<ScanSummary> {
        let state = self.state.lock();
        let mut records: Vec<&ScanRecord> = state.scans.values().collect();
        records.sort_by(|a, b| b.created_at.partial_cmp(&a.created_at).unwrap());
        records
            .into_iter()
            .take(limit)
            .map(|r| ScanSummary {
                scan_id: r.scan_id.clone(),
                state: r.state,
                created_at: r.created_at,
                updated_at: r.updated_at,
                roots: r.roots.clone(),
                group_count: r.groups.len(),
                has_plan: r.delete_plan.is_some(),
            })
            .collect()
    }

    /// Full snapshot of a scan, or `None` (`scan_id` defaults to the current
    /// scan) if there is nothing recorded under that id.
    pub fn snapshot(&self, scan_id: Option<&str>) -> Option<ScanRecord> {
        let state = self.state.lock();
        let target = scan_id
            .map(str::to_string)
            .or_else(|| state.current_scan_id.clone())?;
        state.scans.get(&target).cloned()
    }

    // ---------------------------------------------------------------
    // UI intent management
    // ---------------------------------------------------------------

    pub fn lock_survivor(&self, scan_id: &str, path: &Path, reason: &str) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        let key = normalize(path);
        record.survivor_locks.insert(
            key.clone(),
            SurvivorLock {
                path: path.to_path_buf(),
                reason: reason.to_string(),
                timestamp: now_secs(),
            },
        );
        record.delete_intents.remove(&key);
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    pub fn unlock_survivor(&self, scan_id: &str, path: &Path) {
        let mut state = self.state.lock();
        if let Some(record) = state.scans.get_mut(scan_id) {
            record.survivor_locks.remove(&normalize(path));
            record.updated_at = now_secs();
        }
    }

    /// Sets a deletion intent. A path already locked as survivor refuses the
    /// intent and records a warning instead, per the survivor/delete-intent
    /// mutual-exclusion invariant; this is otherwise a no-op, not an error.
    pub fn set_delete_intent(&self, scan_id: &str, path: &Path, reason: &str) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        let key = normalize(path);
        if record.survivor_locks.contains_key(&key) {
            record
                .warnings
                .push(format!("Delete intent ignored (survivor locked): {key}"));
            return Ok(());
        }
        record.delete_intents.insert(
            key,
            DeleteIntent {
                path: path.to_path_buf(),
                reason: reason.to_string(),
                timestamp: now_secs(),
            },
        );
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    pub fn clear_delete_intent(&self, scan_id: &str, path: &Path) {
        let mut state = self.state.lock();
        if let Some(record) = state.scans.get_mut(scan_id) {
            record.delete_intents.remove(&normalize(path));
            record.updated_at = now_secs();
        }
    }

    pub fn clear_all_intents(&self, scan_id: &str) -> SessionResult<()> {
        let mut state = self.state.lock();
        let record = require_mut(&mut state.scans, scan_id)?;
        record.delete_intents.clear();
        record.survivor_locks.clear();
        record.updated_at = now_secs();
        self.persist(record);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Utilities
    // ---------------------------------------------------------------

    /// Assembles a delete plan skeleton purely from recorded UI intents, for
    /// callers that never built one explicitly.
    pub fn build_effective_plan(
        &self,
        scan_id: &str,
        token: Option<String>,
        policy: &str,
    ) -> Option<EffectivePlan> {
        let state = self.state.lock();
        let record = state.scans.get(scan_id)?;
        if record.groups.is_empty() {
            return None;
        }
        let token = token.unwrap_or_else(|| format!("ui_{}", (now_secs() * 1000.0) as i64));
        let mut items: Vec<EffectivePlanItem> = record
            .survivor_locks
            .values()
            .map(|lock| EffectivePlanItem {
                path: lock.path.clone(),
                reason: lock.reason.clone(),
                survivor: true,
            })
            .collect();
        items.extend(record.delete_intents.values().map(|intent| EffectivePlanItem {
            path: intent.path.clone(),
            reason: intent.reason.clone(),
            survivor: false,
        }));
        Some(EffectivePlan {
            token,
            policy: policy.to_string(),
            items,
        })
    }

    pub fn cleanup_old_sessions(&self, max_age_days: u32) -> usize {
        let mut state = self.state.lock();
        let cutoff = now_secs() - (max_age_days as f64 * 86_400.0);
        let stale: Vec<String> = state
            .scans
            .iter()
            .filter(|(_, r)| r.updated_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for scan_id in &stale {
            state.scans.remove(scan_id);
            let path = self.record_path(scan_id);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(scan_id, error = %e, "failed to remove stale session file");
                }
            }
        }
        stale.len()
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    fn record_path(&self, scan_id: &str) -> PathBuf {
        self.persist_path.join(format!("{scan_id}.json"))
    }

    /// Best-effort atomic write: serialize to a temp file in the same
    /// directory, fsync, then rename into place. Failures are logged, never
    /// propagated — a session record is a convenience mirror, not the
    /// source of truth for a running scan.
    fn persist(&self, record: &ScanRecord) {
        if let Err(e) = self.try_persist(record) {
            warn!(scan_id = %record.scan_id, error = %e, "failed to persist session record");
        }
    }

    fn try_persist(&self, record: &ScanRecord) -> SessionResult<()> {
        fs::create_dir_all(&self.persist_path)?;
        let final_path = self.record_path(&record.scan_id);
        let temp_path = final_path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }
}

fn normalize(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

fn require_mut<'a>(
    scans: &'a mut HashMap<String, ScanRecord>,
    scan_id: &str,
) -> SessionResult<&'a mut ScanRecord> {
    scans
        .get_mut(scan_id)
        .ok_or_else(|| SessionError::UnknownScan(scan_id.to_string()))
}

fn load_persisted(persist_path: &Path) -> SessionResult<HashMap<String, ScanRecord>> {
    let mut scans = HashMap::new();
    if !persist_path.exists() {
        return Ok(scans);
    }
    let entries = match fs::read_dir(persist_path) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "failed to read session directory");
            return Ok(scans);
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match fs::read(&path).map_err(SessionError::from).and_then(|bytes| {
            serde_json::from_slice::<ScanRecord>(&bytes).map_err(SessionError::from)
        }) {
            Ok(record) => {
                scans.insert(record.scan_id.clone(), record);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load session record");
            }
        }
    }
    Ok(scans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn manager() -> (tempfile::TempDir, SessionManager) {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SessionManager::open(Some(dir.path().to_path_buf())).unwrap();
        (dir, mgr)
    }

    #[test]
    fn begin_scan_sets_current_and_running_state() {
        let (_dir, mgr) = manager();
        mgr.begin_scan("scan-1", vec![PathBuf::from("/tmp")], serde_json::json!({}));
        assert_eq!(mgr.current_scan_id().as_deref(), Some("scan-1"));
        let snap = mgr.snapshot(None).unwrap();
        assert_eq!(snap.state, ScanState::Running);
    }

    #[test]
    fn set_groups_transitions_to_scanned_and_persists() {
        let (dir, mgr) = manager();
        mgr.begin_scan("scan-1", vec![], serde_json::json!({}));
        let groups = vec![GroupSnapshot {
            digest: "abc".into(),
            size: 10,
            paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        }];
        mgr.set_groups("scan-1", groups).unwrap();
        let snap = mgr.snapshot(Some("scan-1")).unwrap();
        assert_eq!(snap.state, ScanState::Scanned);
        assert_eq!(snap.groups.len(), 1);
        assert!(dir.path().join("scan-1.json").exists());
    }

    #[test]
    fn unknown_scan_id_is_reported_as_error() {
        let (_dir, mgr) = manager();
        let err = mgr.set_delete_plan("nope", serde_json::json!({}));
        assert!(matches!(err, Err(SessionError::UnknownScan(_))));
    }

    #[test]
    fn survivor_lock_clears_any_existing_delete_intent() {
        let (_dir, mgr) = manager();
        mgr.begin_scan("scan-1", vec![], serde_json::json!({}));
        let path = Path::new("/some/file.bin");
        mgr.set_delete_intent("scan-1", path, "user_selected").unwrap();
        mgr.lock_survivor("scan-1", path, "user_locked").unwrap();
        let snap = mgr.snapshot(Some("scan-1")).unwrap();
        assert!(snap.delete_intents.is_empty());
        assert_eq!(snap.survivor_locks.len(), 1);
    }

    #[test]
    fn delete_intent_on_locked_survivor_is_refused_with_warning() {
        let (_dir, mgr) = manager();
        mgr.begin_scan("scan-1", vec![], serde_json::json!({}));
        let path = Path::new("/some/file.bin");
        mgr.lock_survivor("scan-1", path, "user_locked").unwrap();
        mgr.set_delete_intent("scan-1", path, "user_selected").unwrap();
        let snap = mgr.snapshot(Some("scan-1")).unwrap();
        assert!(snap.delete_intents.is_empty());
        assert_eq!(snap.warnings.len(), 1);
    }

    #[test]
    fn persisted_records_reload_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mgr = SessionManager::open(Some(dir.path().to_path_buf())).unwrap();
            mgr.begin_scan("scan-1", vec![PathBuf::from("/tmp")], serde_json::json!({}));
        }
        let mgr2 = SessionManager::open(Some(dir.path().to_path_buf())).unwrap();
        let snap = mgr2.snapshot(Some("scan-1")).unwrap();
        assert_eq!(snap.scan_id, "scan-1");
    }

    #[test]
    fn cleanup_old_sessions_removes_stale_records() {
        let (dir, mgr) = manager();
        mgr.begin_scan("scan-1", vec![], serde_json::json!({}));
        {
            let mut state = mgr.state.lock();
            state.scans.get_mut("scan-1").unwrap().updated_at = 0.0;
        }
        let removed = mgr.cleanup_old_sessions(30);
        assert_eq!(removed, 1);
        assert!(!dir.path().join("scan-1.json").exists());
    }
}
