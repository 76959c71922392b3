use std::path::PathBuf;

/// Lightweight file record produced by discovery. Holds no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_ns: i64,
}

/// Cheap per-directory fingerprint used to skip unchanged directories on a
/// repeat scan. Purely an optimization: a mismatched or absent signature
/// always falls through to a full `read_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirSignature {
    pub file_count: u64,
    pub dir_count: u64,
    pub total_size: u64,
    pub max_child_mtime: i64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscoveryStats {
    pub files_scanned: u64,
    pub dirs_scanned: u64,
    pub dirs_skipped_cache: u64,
    pub warnings: u64,
}

/// Events streamed out of discovery while it runs. The orchestrator
/// consumes these to republish throttled progress to the UI.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Progress { files_found_so_far: u64 },
    Warning { path: PathBuf, reason: String },
}
