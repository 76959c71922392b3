use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub digest: String,
    pub size: u64,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HashingStats {
    pub candidates: u64,
    pub hashed: u64,
    pub cache_hits: u64,
    pub warnings: u64,
}

#[derive(Debug, Clone)]
pub enum HashingEvent {
    Progress {
        done: u64,
        total: u64,
        rate_files_per_second: f64,
        current_path: PathBuf,
    },
    Warning {
        path: PathBuf,
        reason: String,
    },
}
