use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::types::{ProgressEvent, ScanPhase};

/// Minimum gap between `ProgressUpdate` emissions, per the orchestrator's
/// throttle gate (~120ms).
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(120);

/// Maps discovery/hashing sub-progress onto the orchestrator's weighted
/// overall percentage and applies the emission throttle. Phase changes,
/// warnings, and the terminal event are never throttled.
pub struct ProgressPublisher {
    events: Option<Sender<ProgressEvent>>,
    start: Instant,
    last_emit: Instant,
}

impl ProgressPublisher {
    pub fn new(events: Option<Sender<ProgressEvent>>) -> Self {
        let now = Instant::now();
        ProgressPublisher {
            events,
            start: now,
            last_emit: now - PROGRESS_MIN_INTERVAL,
        }
    }

    pub fn phase_changed(&mut self, phase: ScanPhase) {
        self.send(ProgressEvent::PhaseChanged { phase });
    }

    pub fn file_changed(&mut self, current_path: PathBuf) {
        self.send(ProgressEvent::FileChanged { current_path });
    }

    pub fn group_discovered(&mut self, delta: i64) {
        self.send(ProgressEvent::GroupDiscovered { delta });
    }

    pub fn warning(&mut self, path: PathBuf, reason: String) {
        self.send(ProgressEvent::Warning { path, reason });
    }

    /// `phase_fraction` is progress within the current phase, in `[0, 1]`.
    pub fn update(
        &mut self,
        phase: ScanPhase,
        phase_fraction: f64,
        scanned_files: u64,
        scanned_bytes: u64,
    ) {
        let now = Instant::now();
        if now.duration_since(self.last_emit) < PROGRESS_MIN_INTERVAL && phase_fraction < 1.0 {
            return;
        }
        self.last_emit = now;
        let percent = weighted_percent(phase, phase_fraction);
        self.send(ProgressEvent::ProgressUpdate {
            phase,
            message: format!("{} ({:.0}%)", phase.as_str(), percent),
            percent,
            scanned_files,
            scanned_bytes,
            elapsed_seconds: self.start.elapsed().as_secs_f64(),
        });
    }

    pub fn finished(&mut self, result: crate::types::ScanResult) {
        self.send(ProgressEvent::Finished(result));
    }

    pub fn cancelled(&mut self) {
        self.send(ProgressEvent::Cancelled);
    }

    pub fn failed(&mut self, error: String) {
        self.send(ProgressEvent::Failed(error));
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Weighted progress mapping: discovery 0-20%, grouping 20-25%,
/// hashing 25-90%, finalizing 90-100%.
fn weighted_percent(phase: ScanPhase, phase_fraction: f64) -> f64 {
    let phase_fraction = phase_fraction.clamp(0.0, 1.0);
    let (lo, hi) = match phase {
        ScanPhase::New | ScanPhase::Discovering => (0.0, 20.0),
        ScanPhase::Grouping => (20.0, 25.0),
        ScanPhase::Hashing => (25.0, 90.0),
        ScanPhase::Finalizing => (90.0, 100.0),
        ScanPhase::Completed => (100.0, 100.0),
        ScanPhase::Cancelled | ScanPhase::Failed => (0.0, 0.0),
    };
    lo + (hi - lo) * phase_fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_percent_respects_phase_bounds() {
        assert_eq!(weighted_percent(ScanPhase::Discovering, 0.0), 0.0);
        assert_eq!(weighted_percent(ScanPhase::Discovering, 1.0), 20.0);
        assert_eq!(weighted_percent(ScanPhase::Hashing, 0.0), 25.0);
        assert_eq!(weighted_percent(ScanPhase::Hashing, 1.0), 90.0);
        assert_eq!(weighted_percent(ScanPhase::Finalizing, 1.0), 100.0);
    }
}
