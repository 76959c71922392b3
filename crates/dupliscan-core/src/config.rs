use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Files below this many bytes are ignored unless the caller overrides it.
pub const DEFAULT_MIN_SIZE_BYTES: u64 = 1024;

/// Directories that are always skipped, on top of anything the caller lists
/// in `exclude_dirs`.
pub fn default_exclude_dirs() -> HashSet<String> {
    [
        ".git",
        "System Volume Information",
        "$RECYCLE.BIN",
        "node_modules",
        "Recovery",
        "Windows",
        "Program Files",
        "Program Files (x86)",
        "ProgramData",
        "AppData",
        ".svn",
        ".hg",
        "__pycache__",
        ".vscode",
        ".idea",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    All,
    Photos,
    Videos,
    Audio,
}

impl MediaType {
    /// Lowercased, dot-prefixed extensions for this media type, or `None`
    /// for `All` (meaning: don't narrow by extension at all).
    pub fn extensions(self) -> Option<&'static [&'static str]> {
        match self {
            MediaType::All => None,
            MediaType::Photos => Some(&[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".tif", ".webp", ".heic",
                ".heif", ".raw", ".cr2", ".nef", ".arw", ".dng", ".svg",
            ]),
            MediaType::Videos => Some(&[
                ".mp4", ".mkv", ".mov", ".avi", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg",
                ".3gp", ".ts",
            ]),
            MediaType::Audio => Some(&[
                ".mp3", ".flac", ".wav", ".aac", ".ogg", ".m4a", ".wma", ".opus", ".aiff",
                ".alac",
            ]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineTier {
    Simple,
    Advanced,
}

/// Parameters for a single scan, built by the CLI (or any other caller) and
/// handed to the orchestrator unchanged.
///
/// Serializable so a resume payload can round-trip an in-flight scan's
/// exact configuration across a process restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub roots: Vec<PathBuf>,
    pub min_size_bytes: u64,
    pub max_file_size_bytes: u64,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    pub allowed_extensions: Option<Vec<String>>,
    pub exclude_dirs: HashSet<String>,
    pub max_workers: usize,
    pub cache_path: Option<PathBuf>,
    pub media_type: MediaType,
    pub engine: EngineTier,
    /// Gate for the full-hash escalation step (§4.4). Never inferred from
    /// `engine == Advanced` alone — must be set explicitly.
    pub full_hash_escalation: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            roots: Vec::new(),
            min_size_bytes: DEFAULT_MIN_SIZE_BYTES,
            max_file_size_bytes: 0,
            include_hidden: false,
            follow_symlinks: false,
            allowed_extensions: None,
            exclude_dirs: default_exclude_dirs(),
            max_workers: 0,
            cache_path: None,
            media_type: MediaType::All,
            engine: EngineTier::Simple,
            full_hash_escalation: false,
        }
    }
}

impl ScanConfig {
    /// The extension allow-list actually in effect: an explicit
    /// `allowed_extensions` always wins; otherwise `media_type` supplies one.
    pub fn effective_allowed_extensions(&self) -> Option<Vec<String>> {
        if let Some(exts) = &self.allowed_extensions {
            return Some(exts.iter().map(|e| e.to_lowercase()).collect());
        }
        self.media_type
            .extensions()
            .map(|exts| exts.iter().map(|s| s.to_string()).collect())
    }
}

/// Default discovery worker count: `max(16, 2*cpu)`, capped at 64.
pub fn default_discovery_workers() -> usize {
    let cores = num_cpus::get().max(1);
    (2 * cores).max(16).min(64)
}

/// Default hashing worker count: `max(4, 2*cpu)`; `advanced` doubles it, capped at 32.
pub fn default_hashing_workers(engine: EngineTier) -> usize {
    let cores = num_cpus::get().max(1);
    let base = (2 * cores).max(4);
    match engine {
        EngineTier::Simple => base.min(32),
        EngineTier::Advanced => (base * 2).min(32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_extensions_override_media_type() {
        let mut cfg = ScanConfig {
            media_type: MediaType::Photos,
            allowed_extensions: Some(vec![".txt".to_string()]),
            ..ScanConfig::default()
        };
        assert_eq!(
            cfg.effective_allowed_extensions(),
            Some(vec![".txt".to_string()])
        );
        cfg.allowed_extensions = None;
        assert!(cfg
            .effective_allowed_extensions()
            .unwrap()
            .contains(&".jpg".to_string()));
    }

    #[test]
    fn all_media_type_leaves_extensions_unset() {
        let cfg = ScanConfig::default();
        assert!(cfg.effective_allowed_extensions().is_none());
    }

    #[test]
    fn hashing_workers_double_under_advanced_and_cap_at_32() {
        let simple = default_hashing_workers(EngineTier::Simple);
        let advanced = default_hashing_workers(EngineTier::Advanced);
        assert!(advanced >= simple);
        assert!(advanced <= 32);
    }
}
