use std::path::PathBuf;

/// Default root directory for dated `deletions_YYYY-MM-DD.jsonl` files.
pub fn default_audit_dir() -> PathBuf {
    home_dir().join(".cerebro").join("history").join("audit")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
