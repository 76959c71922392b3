use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use dupliscan_core::StatSignature;

use crate::error::CacheResult;

const SCHEMA_VERSION: i64 = 1;

thread_local! {
    static CONNECTIONS: RefCell<HashMap<PathBuf, Connection>> = RefCell::new(HashMap::new());
}

/// A hashed sample of a file's content, keyed to the stat-signature that was
/// current when the hash was computed. A cache hit is only valid when every
/// field of the signature matches the one stored alongside the hash.
#[derive(Debug, Clone)]
struct CachedRow {
    sig: StatSignature,
    quick_hash: Option<String>,
    quick_algo: Option<String>,
    quick_bytes: Option<i64>,
    full_hash: Option<String>,
    full_algo: Option<String>,
}

/// Persistent, signature-validated cache of quick and full content hashes.
///
/// One [`HashCache`] can be cloned freely and shared across worker threads:
/// each thread opens its own SQLite connection to the same database file the
/// first time it touches the cache, mirroring how the underlying engine this
/// was modeled on keeps one connection per worker thread rather than sharing
/// one connection behind a lock.
///
/// The cache is a pure optimization. Every public method degrades to a
/// cache miss (logging a warning) instead of propagating a database error,
/// so a corrupt or unwritable cache file never stops a scan.
#[derive(Debug, Clone)]
pub struct HashCache {
    db_path: Arc<PathBuf>,
}

impl HashCache {
    pub fn open(db_path: impl Into<PathBuf>) -> CacheResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let cache = HashCache {
            db_path: Arc::new(db_path),
        };
        // Touch the connection now so callers see an open failure eagerly
        // instead of on the first worker-thread access.
        cache.with_connection(|_| Ok(()))?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    // ------------------------------------------------------------------
    // Quick hash
    // ------------------------------------------------------------------

    pub fn get_quick(&self, path: &Path, sig: &StatSignature) -> Option<String> {
        match self.try_get_row(path) {
            Ok(Some(row)) if row.sig == *sig => row.quick_hash,
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash cache read failed, treating as miss");
                None
            }
        }
    }

    pub fn set_quick(&self, path: &Path, sig: &StatSignature, quick_hash: &str, algo: &str, quick_bytes: u64) {
        if let Err(e) = self.upsert(path, sig, Some(quick_hash), Some(algo), Some(quick_bytes as i64), None, None) {
            warn!(path = %path.display(), error = %e, "hash cache write failed, continuing without cache");
        }
    }

    // ------------------------------------------------------------------
    // Full hash
    // ------------------------------------------------------------------

    pub fn get_full(&self, path: &Path, sig: &StatSignature) -> Option<String> {
        match self.try_get_row(path) {
            Ok(Some(row)) if row.sig == *sig => row.full_hash,
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash cache read failed, treating as miss");
                None
            }
        }
    }

    pub fn set_full(&self, path: &Path, sig: &StatSignature, full_hash: &str, algo: &str) {
        if let Err(e) = self.upsert(path, sig, None, None, None, Some(full_hash), Some(algo)) {
            warn!(path = %path.display(), error = %e, "hash cache write failed, continuing without cache");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> CacheResult<T>) -> CacheResult<T> {
        CONNECTIONS.with(|cell| {
            let mut map = cell.borrow_mut();
            if !map.contains_key(self.db_path.as_ref()) {
                let conn = Self::open_connection(&self.db_path)?;
                map.insert(self.db_path.as_ref().clone(), conn);
            }
            let conn = map.get(self.db_path.as_ref()).expect("just inserted above");
            f(conn)
        })
    }

    fn open_connection(path: &Path) -> CacheResult<Connection> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000i64)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_hashes (
                path        TEXT PRIMARY KEY,
                size        INTEGER NOT NULL,
                mtime_ns    INTEGER NOT NULL,
                dev         INTEGER NOT NULL,
                inode       INTEGER NOT NULL,
                quick_hash  TEXT,
                quick_algo  TEXT,
                quick_bytes INTEGER,
                full_hash   TEXT,
                full_algo   TEXT,
                updated_ts  REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_sig ON file_hashes(size, mtime_ns, dev, inode);",
        )?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(conn)
    }

    fn try_get_row(&self, path: &Path) -> CacheResult<Option<CachedRow>> {
        let key = path.to_string_lossy().into_owned();
        self.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT size, mtime_ns, dev, inode, quick_hash, quick_algo, quick_bytes, full_hash, full_algo
                     FROM file_hashes WHERE path = ?1",
                    [&key],
                    |r| {
                        Ok(CachedRow {
                            sig: StatSignature {
                                size: r.get::<_, i64>(0)? as u64,
                                mtime_ns: r.get(1)?,
                                dev: r.get::<_, i64>(2)? as u64,
                                inode: r.get::<_, i64>(3)? as u64,
                            },
                            quick_hash: r.get(4)?,
                            quick_algo: r.get(5)?,
                            quick_bytes: r.get(6)?,
                            full_hash: r.get(7)?,
                            full_algo: r.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Upsert preserving any field not supplied in this call, so a quick-hash
    /// write never clobbers a previously recorded full hash and vice versa.
    #[allow(clippy::too_many_arguments)]
    fn upsert(
        &self,
        path: &Path,
        sig: &StatSignature,
        quick_hash: Option<&str>,
        quick_algo: Option<&str>,
        quick_bytes: Option<i64>,
        full_hash: Option<&str>,
        full_algo: Option<&str>,
    ) -> CacheResult<()> {
        let key = path.to_string_lossy().into_owned();
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        self.with_connection(|conn| {
            let existing = conn
                .query_row(
                    "SELECT quick_hash, quick_algo, quick_bytes, full_hash, full_algo
                     FROM file_hashes WHERE path = ?1",
                    [&key],
                    |r| {
                        Ok((
                            r.get::<_, Option<String>>(0)?,
                            r.get::<_, Option<String>>(1)?,
                            r.get::<_, Option<i64>>(2)?,
                            r.get::<_, Option<String>>(3)?,
                            r.get::<_, Option<String>>(4)?,
                        ))
                    },
                )
                .optional()?;

            let (ex_qh, ex_qa, ex_qb, ex_fh, ex_fa) =
                existing.unwrap_or((None, None, None, None, None));

            let qh = quick_hash.map(str::to_string).or(ex_qh);
            let qa = quick_algo.map(str::to_string).or(ex_qa);
            let qb = quick_bytes.or(ex_qb);
            let fh = full_hash.map(str::to_string).or(ex_fh);
            let fa = full_algo.map(str::to_string).or(ex_fa);

            conn.execute(
                "INSERT INTO file_hashes
                   (path, size, mtime_ns, dev, inode, quick_hash, quick_algo, quick_bytes, full_hash, full_algo, updated_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(path) DO UPDATE SET
                   size = excluded.size,
                   mtime_ns = excluded.mtime_ns,
                   dev = excluded.dev,
                   inode = excluded.inode,
                   quick_hash = excluded.quick_hash,
                   quick_algo = excluded.quick_algo,
                   quick_bytes = excluded.quick_bytes,
                   full_hash = excluded.full_hash,
                   full_algo = excluded.full_algo,
                   updated_ts = excluded.updated_ts",
                rusqlite::params![
                    key,
                    sig.size as i64,
                    sig.mtime_ns,
                    sig.dev as i64,
                    sig.inode as i64,
                    qh,
                    qa,
                    qb,
                    fh,
                    fa,
                    now,
                ],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(size: u64) -> StatSignature {
        StatSignature {
            size,
            mtime_ns: 1_000,
            dev: 1,
            inode: 42,
        }
    }

    #[test]
    fn quick_hash_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();
        let path = Path::new("/tmp/does-not-matter.bin");
        let s = sig(100);

        assert!(cache.get_quick(path, &s).is_none());
        cache.set_quick(path, &s, "deadbeef", "md5", 100);
        assert_eq!(cache.get_quick(path, &s).as_deref(), Some("deadbeef"));
    }

    #[test]
    fn stale_signature_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();
        let path = Path::new("/tmp/rewritten.bin");

        cache.set_quick(path, &sig(100), "hash-of-old-content", "md5", 100);
        assert!(cache.get_quick(path, &sig(200)).is_none());
    }

    #[test]
    fn quick_and_full_hash_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();
        let path = Path::new("/tmp/full.bin");
        let s = sig(5_000_000);

        cache.set_quick(path, &s, "quick-abc", "md5", 3 * 1024 * 1024);
        cache.set_full(path, &s, "full-xyz", "sha256");

        assert_eq!(cache.get_quick(path, &s).as_deref(), Some("quick-abc"));
        assert_eq!(cache.get_full(path, &s).as_deref(), Some("full-xyz"));
    }

    #[test]
    fn setting_full_hash_preserves_existing_quick_hash() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HashCache::open(dir.path().join("cache.sqlite3")).unwrap();
        let path = Path::new("/tmp/preserve.bin");
        let s = sig(10);

        cache.set_quick(path, &s, "quick-only", "md5", 10);
        cache.set_full(path, &s, "full-later", "sha256");

        assert_eq!(cache.get_quick(path, &s).as_deref(), Some("quick-only"));
        assert_eq!(cache.get_full(path, &s).as_deref(), Some("full-later"));
    }
}
