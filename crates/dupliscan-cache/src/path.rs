use std::path::PathBuf;

/// Default location for the hash cache database, following the same
/// `~/.cerebro_cache/` layout the rest of this toolchain's persisted state
/// uses (cf. `dupliscan-inventory`'s sibling `inventory.sqlite`).
pub fn default_cache_path() -> PathBuf {
    home_dir().join(".cerebro_cache").join("hash_cache.sqlite")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
