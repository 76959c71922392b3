use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::types::{DeletionMode, SingleDeletionOutcome};

/// Relocates a file to the OS trash/recycle bin. Falls back to a per-user
/// quarantine directory (timestamped name, same as the original file's
/// basename) when the platform trash facility is unavailable.
pub fn delete_trash(path: &Path) -> SingleDeletionOutcome {
    if !path.exists() {
        return missing(path);
    }
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    match trash::delete(path) {
        Ok(()) => SingleDeletionOutcome {
            path: path.to_path_buf(),
            bytes_reclaimed: size,
            error: None,
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "platform trash unavailable, falling back to quarantine");
            match quarantine(path) {
                Ok(()) => SingleDeletionOutcome {
                    path: path.to_path_buf(),
                    bytes_reclaimed: size,
                    error: None,
                },
                Err(e) => SingleDeletionOutcome {
                    path: path.to_path_buf(),
                    bytes_reclaimed: 0,
                    error: Some(e.to_string()),
                },
            }
        }
    }
}

fn quarantine(path: &Path) -> std::io::Result<()> {
    let quarantine_dir = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cerebro")
        .join("trash");
    std::fs::create_dir_all(&quarantine_dir)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let dest = quarantine_dir.join(format!("{stamp}_{name}"));
    std::fs::rename(path, dest)
}

/// Unlinks a file or recursively removes a directory.
pub fn delete_permanent(path: &Path) -> SingleDeletionOutcome {
    if !path.exists() {
        return missing(path);
    }
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            return SingleDeletionOutcome {
                path: path.to_path_buf(),
                bytes_reclaimed: 0,
                error: Some(e.to_string()),
            }
        }
    };
    let size = if meta.is_file() { meta.len() } else { 0 };

    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => SingleDeletionOutcome {
            path: path.to_path_buf(),
            bytes_reclaimed: size,
            error: None,
        },
        Err(e) => SingleDeletionOutcome {
            path: path.to_path_buf(),
            bytes_reclaimed: 0,
            error: Some(e.to_string()),
        },
    }
}

fn missing(path: &Path) -> SingleDeletionOutcome {
    SingleDeletionOutcome {
        path: path.to_path_buf(),
        bytes_reclaimed: 0,
        error: Some("file does not exist".to_string()),
    }
}

/// Dispatches a single delete to the adapter selected by `mode`.
pub fn delete_one(path: &Path, mode: DeletionMode) -> SingleDeletionOutcome {
    match mode {
        DeletionMode::Trash => delete_trash(path),
        DeletionMode::Permanent => delete_permanent(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_delete_removes_file_and_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![0u8; 42]).unwrap();

        let outcome = delete_permanent(&path);
        assert!(outcome.is_success());
        assert_eq!(outcome.bytes_reclaimed, 42);
        assert!(!path.exists());
    }

    #[test]
    fn permanent_delete_removes_directory_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("inner.bin"), b"x").unwrap();

        let outcome = delete_permanent(&sub);
        assert!(outcome.is_success());
        assert!(!sub.exists());
    }

    #[test]
    fn missing_file_is_reported_as_failure_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = delete_permanent(&dir.path().join("nope.bin"));
        assert!(!outcome.is_success());
    }
}
