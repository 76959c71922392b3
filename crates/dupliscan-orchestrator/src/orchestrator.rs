use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{unbounded, Sender};
use thiserror::Error;
use tracing::{info, warn};

use dupliscan_cache::HashCache;
use dupliscan_core::{CancelToken, ScanConfig};
use dupliscan_discovery::{discover, DirSignatureCache, DiscoveryEvent};
use dupliscan_hashing::HashingEvent;
use dupliscan_inventory::{DiscoveredFileRecord, InventoryStore, ResumePayload, ResumeStore, ScanStatus};
use dupliscan_session::{GroupSnapshot, SessionManager};

use crate::progress::ProgressPublisher;
use crate::types::{DuplicateGroup, ProgressEvent, ScanPhase, ScanResult, ScanStats};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("inventory store error: {0}")]
    Inventory(#[from] dupliscan_inventory::InventoryError),

    #[error("session manager error: {0}")]
    Session(#[from] dupliscan_session::SessionError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Drives discovery (C3) into the hashing pipeline (C4), persisting
/// checkpoints to the inventory store (C2) and the session manager (C8),
/// and publishing the weighted progress stream described in §4.5.
///
/// Every store is constructed by the caller and handed in, never reached
/// for as ambient/global state: the orchestrator owns only the in-flight
/// scan's own bookkeeping. `resume` is optional: when given, a
/// [`ResumePayload`] is written once discovery starts and cleared on every
/// terminal transition, so at most one payload is ever on disk at a time.
#[allow(clippy::too_many_arguments)]
pub fn run_scan(
    scan_id: &str,
    config: &ScanConfig,
    cache: &HashCache,
    inventory: &InventoryStore,
    session: &SessionManager,
    cancel: &CancelToken,
    events: Option<Sender<ProgressEvent>>,
    resume: Option<&ResumeStore>,
) -> OrchestratorResult<ScanResult> {
    let start = Instant::now();
    let mut publisher = ProgressPublisher::new(events.clone());

    if let Err(msg) = validate_config(config) {
        publisher.failed(msg.clone());
        return Err(OrchestratorError::Config(msg));
    }

    session.begin_scan(
        scan_id,
        config.roots.clone(),
        serde_json::json!({ "engine": format!("{:?}", config.engine) }),
    );
    inventory.begin_scan(scan_id, &config.roots)?;

    if let Some(resume) = resume {
        let payload = ResumePayload {
            scan_id: scan_id.to_string(),
            config: config.clone(),
            inventory_db_path: inventory.path().to_path_buf(),
            checkpoint_path: inventory.path().to_path_buf(),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        if let Err(e) = resume.save(&payload) {
            warn!(scan_id, error = %e, "failed to write resume payload, continuing without it");
        }
    }

    publisher.phase_changed(ScanPhase::Discovering);

    let dir_cache = DirSignatureCache::new(10_000);
    let (disc_tx, disc_rx) = unbounded::<DiscoveryEvent>();
    let forward_cancel = cancel.clone();
    let mut forward_publisher = ProgressPublisher::new(events.clone());
    let forwarder = thread::spawn(move || {
        for event in disc_rx {
            match event {
                DiscoveryEvent::Progress { files_found_so_far } => {
                    if forward_cancel.is_cancelled() {
                        continue;
                    }
                    forward_publisher.update(ScanPhase::Discovering, 0.5, files_found_so_far, 0);
                }
                DiscoveryEvent::Warning { path, reason } => {
                    forward_publisher.warning(path, reason);
                }
            }
        }
    });

    let (files, discovery_stats) = discover(config, cancel, Some(&dir_cache), Some(&disc_tx));
    drop(disc_tx);
    let _ = forwarder.join();

    if cancel.is_cancelled() {
        return finish_cancelled(scan_id, inventory, session, resume, &mut publisher);
    }

    let records: Vec<DiscoveredFileRecord> = files
        .iter()
        .map(|f| DiscoveredFileRecord {
            path: f.path.to_string_lossy().into_owned(),
            size: f.size,
            mtime_ns: f.mtime_ns,
        })
        .collect();
    if let Err(e) = inventory.record_discovery(scan_id, &records) {
        clear_resume(resume);
        return Err(e.into());
    }

    publisher.phase_changed(ScanPhase::Grouping);
    publisher.update(ScanPhase::Grouping, 1.0, files.len() as u64, 0);

    if cancel.is_cancelled() {
        return finish_cancelled(scan_id, inventory, session, resume, &mut publisher);
    }

    publisher.phase_changed(ScanPhase::Hashing);

    let (hash_tx, hash_rx) = unbounded::<HashingEvent>();
    let mut hash_publisher = ProgressPublisher::new(events.clone());
    let hash_cancel = cancel.clone();
    let hash_forwarder = thread::spawn(move || {
        for event in hash_rx {
            match event {
                HashingEvent::Progress {
                    done,
                    total,
                    current_path,
                    ..
                } => {
                    if hash_cancel.is_cancelled() {
                        continue;
                    }
                    let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
                    hash_publisher.file_changed(current_path);
                    hash_publisher.update(ScanPhase::Hashing, fraction, done, 0);
                }
                HashingEvent::Warning { path, reason } => {
                    hash_publisher.warning(path, reason);
                }
            }
        }
    });

    let (groups, hashing_stats) = dupliscan_hashing::run(&files, config, cache, cancel, Some(&hash_tx));
    drop(hash_tx);
    let _ = hash_forwarder.join();

    if cancel.is_cancelled() {
        return finish_cancelled(scan_id, inventory, session, resume, &mut publisher);
    }

    publisher.phase_changed(ScanPhase::Finalizing);
    publisher.group_discovered(groups.len() as i64);

    let stats = ScanStats {
        files_scanned: discovery_stats.files_scanned,
        candidates: hashing_stats.candidates,
        duplicate_groups: groups.len() as u64,
        elapsed_seconds: start.elapsed().as_secs_f64(),
        workers: effective_hashing_workers(config),
    };

    let result_groups: Vec<DuplicateGroup> = groups
        .into_iter()
        .map(|g| DuplicateGroup {
            digest: g.digest,
            size: g.size,
            paths: g.paths,
        })
        .collect();

    let snapshots: Vec<GroupSnapshot> = result_groups
        .iter()
        .map(|g| GroupSnapshot {
            digest: g.digest.clone(),
            size: g.size,
            paths: g.paths.clone(),
        })
        .collect();
    if let Err(e) = session.set_groups(scan_id, snapshots) {
        clear_resume(resume);
        return Err(e.into());
    }
    if let Err(e) = inventory.set_status(scan_id, ScanStatus::Scanned, "finalizing") {
        clear_resume(resume);
        return Err(e.into());
    }
    clear_resume(resume);

    let result = ScanResult {
        ok: true,
        scan_id: scan_id.to_string(),
        groups: result_groups,
        stats,
        scan_root: config.roots.clone(),
        scan_name: scan_name(&config.roots),
        scan_duration: start.elapsed().as_secs_f64(),
    };

    publisher.phase_changed(ScanPhase::Completed);
    publisher.finished(result.clone());
    info!(scan_id, duration = result.scan_duration, "scan completed");

    Ok(result)
}

fn finish_cancelled(
    scan_id: &str,
    inventory: &InventoryStore,
    session: &SessionManager,
    resume: Option<&ResumeStore>,
    publisher: &mut ProgressPublisher,
) -> OrchestratorResult<ScanResult> {
    clear_resume(resume);
    inventory.set_status(scan_id, ScanStatus::Cancelled, "cancelled")?;
    session.mark_cancelled(scan_id, "cancel_scan requested");
    publisher.phase_changed(ScanPhase::Cancelled);
    publisher.cancelled();
    Ok(ScanResult {
        ok: false,
        scan_id: scan_id.to_string(),
        groups: Vec::new(),
        stats: ScanStats::default(),
        scan_root: Vec::new(),
        scan_name: String::new(),
        scan_duration: 0.0,
    })
}

/// Best-effort: a resume payload is a crash-recovery convenience, so a
/// failure to remove it is logged, never propagated.
fn clear_resume(resume: Option<&ResumeStore>) {
    if let Some(resume) = resume {
        if let Err(e) = resume.clear() {
            warn!(error = %e, "failed to clear resume payload");
        }
    }
}

fn validate_config(config: &ScanConfig) -> Result<(), String> {
    if config.roots.is_empty() {
        return Err("at least one scan root is required".to_string());
    }
    for root in &config.roots {
        if !root.exists() {
            return Err(format!("root does not exist: {}", root.display()));
        }
        if root.is_dir() {
            if let Err(e) = std::fs::read_dir(root) {
                return Err(format!("root is not readable: {}: {e}", root.display()));
            }
        }
    }
    Ok(())
}

fn effective_hashing_workers(config: &ScanConfig) -> usize {
    if config.max_workers > 0 {
        config.max_workers
    } else {
        dupliscan_core::default_hashing_workers(config.engine)
    }
}

fn scan_name(roots: &[PathBuf]) -> String {
    roots
        .first()
        .and_then(|r| r.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string())
}

/// Cooperative cancellation request: sets the flag; `run_scan` observes it
/// at the next work-unit checkpoint in whichever phase is currently active.
pub fn cancel_scan(cancel: &CancelToken) {
    cancel.cancel();
    warn!("scan cancellation requested");
}
