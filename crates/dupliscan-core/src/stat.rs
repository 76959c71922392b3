use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};

/// Uniquely identifies a file's content-snapshot across scans.
///
/// A cache entry keyed by a stat-signature is only valid if every field of
/// a freshly observed signature matches exactly — the signature is the sole
/// arbiter of cache validity (see dupliscan-cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatSignature {
    pub size: u64,
    pub mtime_ns: i64,
    pub dev: u64,
    pub inode: u64,
}

impl StatSignature {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        Self::from_metadata(&meta)
    }

    pub fn from_metadata(meta: &fs::Metadata) -> io::Result<Self> {
        let size = meta.len();
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        #[cfg(unix)]
        let (dev, inode) = {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino())
        };
        #[cfg(not(unix))]
        let (dev, inode) = (0u64, 0u64);

        Ok(StatSignature {
            size,
            mtime_ns,
            dev,
            inode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_changes_when_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"hello").unwrap();
        let sig1 = StatSignature::from_path(&path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(&path, b"hello world").unwrap();
        let sig2 = StatSignature::from_path(&path).unwrap();

        assert_ne!(sig1.size, sig2.size);
    }

    #[test]
    fn signature_stable_for_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"stable").unwrap();

        let sig1 = StatSignature::from_path(&path).unwrap();
        let sig2 = StatSignature::from_path(&path).unwrap();
        assert_eq!(sig1, sig2);
    }
}
