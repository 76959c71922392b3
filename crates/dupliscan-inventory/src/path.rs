use std::path::PathBuf;

/// Default inventory database location, kept separate from the hash cache —
/// this is the fast, resumable working index for active/partial scans.
/// Lives under `~/.cerebro_cache/`, the same layout `dupliscan-cache` uses
/// for its sibling `hash_cache.sqlite`.
pub fn default_inventory_path() -> PathBuf {
    home_dir().join(".cerebro_cache").join("inventory.sqlite")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
