use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{EngineTier, MediaType, ScanConfig, DEFAULT_MIN_SIZE_BYTES};

// ============================================================================
// Media Type / Engine Value Enums (clap-facing mirrors of config::*)
// ============================================================================

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MediaTypeArg {
    All,
    Photos,
    Videos,
    Audio,
}

impl From<MediaTypeArg> for MediaType {
    fn from(v: MediaTypeArg) -> Self {
        match v {
            MediaTypeArg::All => MediaType::All,
            MediaTypeArg::Photos => MediaType::Photos,
            MediaTypeArg::Videos => MediaType::Videos,
            MediaTypeArg::Audio => MediaType::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EngineArg {
    Simple,
    Advanced,
}

impl From<EngineArg> for EngineTier {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Simple => EngineTier::Simple,
            EngineArg::Advanced => EngineTier::Advanced,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DeletionModeArg {
    Trash,
    Permanent,
}

// ============================================================================
// Top-level CLI
// ============================================================================

/// dupliscan - duplicate file detection and guided cleanup
#[derive(Parser, Debug)]
#[command(name = "dupliscan")]
#[command(about = "Scan directories for duplicate files and manage deletion plans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan one or more roots for duplicates
    Scan(ScanArgs),
    /// Execute a deletion plan (JSON file) produced from a scan result
    Delete(DeleteArgs),
    /// Query the append-only deletion audit log
    Audit(AuditArgs),
}

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// One or more absolute roots to scan
    #[arg(required = true)]
    pub roots: Vec<PathBuf>,

    /// Minimum file size in bytes (files below are ignored)
    #[arg(long, default_value_t = DEFAULT_MIN_SIZE_BYTES)]
    pub min_size_bytes: u64,

    /// Maximum file size in bytes (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_file_size_bytes: u64,

    /// Include hidden files and directories
    #[arg(long)]
    pub include_hidden: bool,

    /// Follow symlinked directories during traversal
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Allow-list of extensions, e.g. --ext .jpg --ext .png
    #[arg(long = "ext")]
    pub allowed_extensions: Vec<String>,

    /// Directory basenames to exclude, on top of the built-in defaults
    #[arg(long = "exclude")]
    pub exclude_dirs: Vec<String>,

    /// Worker count override (0 = auto)
    #[arg(long, default_value_t = 0)]
    pub max_workers: usize,

    /// Override the default cache database path
    #[arg(long)]
    pub cache_path: Option<PathBuf>,

    /// Narrow discovery to a fixed media category
    #[arg(long, value_enum, default_value = "all")]
    pub media_type: MediaTypeArg,

    /// simple = balanced defaults; advanced = more hashing workers
    #[arg(long, value_enum, default_value = "simple")]
    pub engine: EngineArg,

    /// Escalate quick-hash buckets to a full SHA-256 confirmation pass
    #[arg(long)]
    pub full_hash: bool,

    /// Suppress the duplicate-group listing, print only the summary line
    #[arg(long)]
    pub quiet: bool,
}

impl ScanArgs {
    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig {
            roots: self.roots.clone(),
            min_size_bytes: self.min_size_bytes,
            max_file_size_bytes: self.max_file_size_bytes,
            include_hidden: self.include_hidden,
            follow_symlinks: self.follow_symlinks,
            allowed_extensions: if self.allowed_extensions.is_empty() {
                None
            } else {
                Some(self.allowed_extensions.clone())
            },
            exclude_dirs: {
                let mut set = crate::config::default_exclude_dirs();
                set.extend(self.exclude_dirs.iter().cloned());
                set
            },
            max_workers: self.max_workers,
            cache_path: self.cache_path.clone(),
            media_type: self.media_type.into(),
            engine: self.engine.into(),
            full_hash_escalation: self.full_hash,
        }
    }
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    /// Path to a JSON deletion plan (see dupliscan-deletion::plan::DeletePlan)
    pub plan_path: PathBuf,

    #[arg(long, value_enum, default_value = "trash")]
    pub mode: DeletionModeArg,

    /// Label recorded in the audit log (e.g. "cli", "ui")
    #[arg(long, default_value = "cli")]
    pub source: String,
}

#[derive(Parser, Debug)]
pub struct AuditArgs {
    /// Only show records from the last N days
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    /// Cap on the number of rows returned
    #[arg(long, default_value_t = 1000)]
    pub limit: usize,

    /// Export matched records to this path instead of printing a summary
    #[arg(long)]
    pub export: Option<PathBuf>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
