use std::path::PathBuf;

/// The scan lifecycle state machine, per scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    New,
    Discovering,
    Grouping,
    Hashing,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl ScanPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanPhase::New => "new",
            ScanPhase::Discovering => "discovering",
            ScanPhase::Grouping => "grouping",
            ScanPhase::Hashing => "hashing",
            ScanPhase::Finalizing => "finalizing",
            ScanPhase::Completed => "completed",
            ScanPhase::Cancelled => "cancelled",
            ScanPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanPhase::Completed | ScanPhase::Cancelled | ScanPhase::Failed
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_scanned: u64,
    pub candidates: u64,
    pub duplicate_groups: u64,
    pub elapsed_seconds: f64,
    pub workers: usize,
}

/// A duplicate group as surfaced in a finished scan result.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub digest: String,
    pub size: u64,
    pub paths: Vec<PathBuf>,
}

/// Immutable once emitted: the terminal, successful outcome of a scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub ok: bool,
    pub scan_id: String,
    pub groups: Vec<DuplicateGroup>,
    pub stats: ScanStats,
    pub scan_root: Vec<PathBuf>,
    pub scan_name: String,
    pub scan_duration: f64,
}

/// Progress events streamed to the UI layer, mirroring the external
/// interface contract: phase changes, file/group movement, warnings, a
/// throttled aggregate update, and exactly one terminal event.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PhaseChanged {
        phase: ScanPhase,
    },
    FileChanged {
        current_path: PathBuf,
    },
    GroupDiscovered {
        delta: i64,
    },
    Warning {
        path: PathBuf,
        reason: String,
    },
    ProgressUpdate {
        phase: ScanPhase,
        message: String,
        percent: f64,
        scanned_files: u64,
        scanned_bytes: u64,
        elapsed_seconds: f64,
    },
    Finished(ScanResult),
    Cancelled,
    Failed(String),
}
