pub mod orchestrator;
pub mod progress;
pub mod types;

pub use orchestrator::{run_scan, OrchestratorError, OrchestratorResult};
pub use progress::ProgressPublisher;
pub use types::{DuplicateGroup, ProgressEvent, ScanPhase, ScanResult, ScanStats};
