use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use crate::types::DirSignature;

/// Process-local, in-memory cache of directory signatures. Never persisted
/// across process restarts — only used to skip re-enumerating an unchanged
/// directory within a single discovery run's lifetime (e.g. a resumed scan
/// that re-touches the same roots).
pub struct DirSignatureCache {
    max_entries: usize,
    entries: Mutex<HashMap<std::path::PathBuf, DirSignature>>,
}

impl DirSignatureCache {
    pub fn new(max_entries: usize) -> Self {
        DirSignatureCache {
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &Path) -> Option<DirSignature> {
        self.entries.lock().get(path).copied()
    }

    pub fn put(&self, path: &Path, sig: DirSignature) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(path) {
            if let Some(k) = entries.keys().next().cloned() {
                entries.remove(&k);
            }
        }
        entries.insert(path.to_path_buf(), sig);
    }

    /// Current signature for `path`, or `None` if it can't be computed
    /// (vanished, permission denied, etc.) — callers should treat that as
    /// "changed" and fall through to a full enumeration.
    pub fn compute(path: &Path) -> Option<DirSignature> {
        let read_dir = fs::read_dir(path).ok()?;
        let mut file_count = 0u64;
        let mut dir_count = 0u64;
        let mut total_size = 0u64;
        let mut max_child_mtime = 0i64;

        for entry in read_dir.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                dir_count += 1;
            } else if file_type.is_file() {
                file_count += 1;
                if let Ok(meta) = entry.metadata() {
                    total_size += meta.len();
                    if let Ok(sig) = dupliscan_core::StatSignature::from_metadata(&meta) {
                        max_child_mtime = max_child_mtime.max(sig.mtime_ns);
                    }
                }
            }
        }

        Some(DirSignature {
            file_count,
            dir_count,
            total_size,
            max_child_mtime,
        })
    }

    pub fn has_changed(&self, path: &Path) -> bool {
        let Some(cached) = self.get(path) else {
            return true;
        };
        match Self::compute(path) {
            Some(current) => current != cached,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_directory_is_recognized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let cache = DirSignatureCache::new(100);
        assert!(cache.has_changed(dir.path()));
        let sig = DirSignatureCache::compute(dir.path()).unwrap();
        cache.put(dir.path(), sig);
        assert!(!cache.has_changed(dir.path()));
    }

    #[test]
    fn adding_a_file_is_detected_as_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DirSignatureCache::new(100);
        let sig = DirSignatureCache::compute(dir.path()).unwrap();
        cache.put(dir.path(), sig);

        std::fs::write(dir.path().join("new.txt"), b"x").unwrap();
        assert!(cache.has_changed(dir.path()));
    }

    #[test]
    fn bounded_cache_evicts_when_full() {
        let cache = DirSignatureCache::new(1);
        let sig = DirSignature {
            file_count: 0,
            dir_count: 0,
            total_size: 0,
            max_child_mtime: 0,
        };
        cache.put(Path::new("/a"), sig);
        cache.put(Path::new("/b"), sig);
        assert_eq!(cache.entries.lock().len(), 1);
    }
}
