use std::collections::{HashMap, HashSet};
use std::thread;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use dupliscan_audit::{AuditLog, AuditRecord, DeletionDetail, DetailStatus, CURRENT_SCHEMA_VERSION};
use dupliscan_cache::HashCache;
use dupliscan_core::cli::{self, AuditArgs, Command, DeleteArgs, DeletionModeArg, ScanArgs};
use dupliscan_core::CancelToken;
use dupliscan_deletion::{
    build_delete_plan, execute_plan, BatchDeletionResult, DeletePlan, DeletionMode, ExecutablePlan,
};
use dupliscan_inventory::{InventoryStore, ResumeStore};
use dupliscan_orchestrator::{run_scan, ProgressEvent};
use dupliscan_session::SessionManager;

fn main() -> Result<()> {
    init_tracing();

    match cli::parse_args().command {
        Command::Scan(args) => run_scan_command(args),
        Command::Delete(args) => run_delete_command(args),
        Command::Audit(args) => run_audit_command(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// scan
// ============================================================================

fn run_scan_command(args: ScanArgs) -> Result<()> {
    let quiet = args.quiet;
    let config = args.to_scan_config();

    let cache_path = config
        .cache_path
        .clone()
        .unwrap_or_else(dupliscan_cache::default_cache_path);
    let cache = HashCache::open(&cache_path)
        .with_context(|| format!("opening hash cache at {}", cache_path.display()))?;

    let inventory_path = dupliscan_inventory::default_inventory_path();
    let inventory = InventoryStore::open(&inventory_path)
        .with_context(|| format!("opening inventory store at {}", inventory_path.display()))?;

    let session = SessionManager::open(None).context("opening session manager")?;
    let resume = ResumeStore::open(dupliscan_inventory::default_resume_payload_path());

    let scan_id = uuid::Uuid::new_v4().to_string();
    let cancel = CancelToken::new();

    let (tx, rx) = crossbeam_channel::unbounded::<ProgressEvent>();
    let printer = thread::spawn(move || {
        for event in rx {
            print_progress_event(&event, quiet);
        }
    });

    let outcome = run_scan(
        &scan_id, &config, &cache, &inventory, &session, &cancel, Some(tx), Some(&resume),
    );
    let _ = printer.join();
    let result = outcome.context("scan failed")?;

    if !result.ok {
        println!("scan {scan_id} cancelled");
        return Ok(());
    }

    if !quiet {
        for (i, group) in result.groups.iter().enumerate() {
            println!("group {i}: {} bytes, digest {}", group.size, group.digest);
            for path in &group.paths {
                println!("  {}", path.display());
            }
        }
    }

    println!(
        "scanned {} files, {} candidates, {} duplicate groups in {:.2}s ({} workers)",
        result.stats.files_scanned,
        result.stats.candidates,
        result.stats.duplicate_groups,
        result.stats.elapsed_seconds,
        result.stats.workers,
    );
    println!("scan_id: {scan_id}");
    Ok(())
}

fn print_progress_event(event: &ProgressEvent, quiet: bool) {
    if quiet {
        return;
    }
    match event {
        ProgressEvent::PhaseChanged { phase } => eprintln!("phase: {}", phase.as_str()),
        ProgressEvent::ProgressUpdate { message, percent, .. } => {
            eprintln!("{message} [{percent:.0}%]")
        }
        ProgressEvent::Warning { path, reason } => {
            eprintln!("warning: {}: {reason}", path.display())
        }
        ProgressEvent::Cancelled => eprintln!("scan cancelled"),
        ProgressEvent::Failed(err) => eprintln!("scan failed: {err}"),
        ProgressEvent::FileChanged { .. } | ProgressEvent::GroupDiscovered { .. } | ProgressEvent::Finished(_) => {}
    }
}

// ============================================================================
// delete
// ============================================================================

fn run_delete_command(args: DeleteArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.plan_path)
        .with_context(|| format!("reading plan file {}", args.plan_path.display()))?;
    let mut plan: DeletePlan = serde_json::from_str(&raw).context("parsing deletion plan JSON")?;
    plan.policy.mode = match args.mode {
        DeletionModeArg::Trash => DeletionMode::Trash,
        DeletionModeArg::Permanent => DeletionMode::Permanent,
    };

    let executable = build_delete_plan(&plan).context("validating deletion plan")?;
    println!(
        "executing {} operations ({} bytes, mode={})",
        executable.total_files(),
        executable.total_bytes(),
        plan.policy.mode.as_str(),
    );

    let result = execute_plan(&executable, |current, total, name| {
        eprintln!("[{current}/{total}] {name}");
        true
    });

    let audit = AuditLog::open(dupliscan_audit::default_audit_dir());
    let record = build_audit_record(&plan, &executable, &result, &args.source);
    if let Err(e) = audit.append(&record) {
        tracing::warn!(error = %e, "failed to append deletion audit record");
    }

    println!(
        "deleted {} files, {} failed, {} bytes reclaimed",
        result.deleted.len(),
        result.failed.len(),
        result.bytes_reclaimed,
    );
    for (path, reason) in &result.failed {
        eprintln!("failed: {}: {reason}", path.display());
    }
    Ok(())
}

/// Reconciles the original intent (`plan`), the validated operations
/// (`executable`), and the execution outcome (`result`) into one audit
/// record. A delete path present in the original plan but absent from
/// `executable.operations` was skipped at validation time (already gone);
/// everything else is either `Deleted` or `Failed` per `result`.
fn build_audit_record(
    plan: &DeletePlan,
    executable: &ExecutablePlan,
    result: &BatchDeletionResult,
    source: &str,
) -> AuditRecord {
    let deleted_set: HashSet<_> = result.deleted.iter().collect();
    let failed_map: HashMap<_, _> = result.failed.iter().map(|(p, reason)| (p, reason)).collect();
    let attempted: HashSet<_> = executable.operations.iter().map(|op| &op.path).collect();

    let mut details: Vec<DeletionDetail> = executable
        .operations
        .iter()
        .map(|op| {
            let (status, error) = if deleted_set.contains(&op.path) {
                (DetailStatus::Deleted, None)
            } else if let Some(reason) = failed_map.get(&op.path) {
                (DetailStatus::Failed, Some((*reason).clone()))
            } else {
                (DetailStatus::Skipped, None)
            };
            DeletionDetail {
                path: op.path.clone(),
                group_index: op.group_index,
                kept_path: op.kept_path.clone(),
                bytes: op.size,
                mtime: op.mtime,
                status,
                error,
            }
        })
        .collect();

    for group in &plan.groups {
        for path in &group.delete {
            if !attempted.contains(path) {
                details.push(DeletionDetail {
                    path: path.clone(),
                    group_index: group.group_index,
                    kept_path: group.keep.clone(),
                    bytes: 0,
                    mtime: 0.0,
                    status: DetailStatus::Skipped,
                    error: None,
                });
            }
        }
    }

    AuditRecord {
        scan_id: plan.scan_id.clone(),
        timestamp: chrono::Utc::now().timestamp() as f64,
        mode: plan.policy.mode.as_str().to_string(),
        groups: plan.groups.len() as u32,
        deleted: result.deleted.len() as u32,
        failed: result.failed.len() as u32,
        bytes_reclaimed: result.bytes_reclaimed,
        source: source.to_string(),
        policy: serde_json::json!({ "mode": plan.policy.mode.as_str() }),
        details,
        schema_version: CURRENT_SCHEMA_VERSION,
    }
}

// ============================================================================
// audit
// ============================================================================

fn run_audit_command(args: AuditArgs) -> Result<()> {
    let audit = AuditLog::open(dupliscan_audit::default_audit_dir());
    let since = (chrono::Utc::now() - chrono::Duration::days(args.days as i64)).timestamp() as f64;
    let records = audit.query(None, None, Some(since), args.limit);

    if let Some(dest) = &args.export {
        let is_csv = dest.extension().and_then(|e| e.to_str()) == Some("csv");
        if is_csv {
            audit.export_csv(dest, &records, |_, _| {}).context("exporting audit records as CSV")?;
        } else {
            audit.export_json(dest, &records, |_, _| {}).context("exporting audit records as JSON")?;
        }
        println!("exported {} records to {}", records.len(), dest.display());
        return Ok(());
    }

    let window = audit.aggregate(args.days);
    println!(
        "last {} days: {} deleted, {} failed, {} bytes reclaimed",
        window.days, window.total_deleted, window.total_failed, window.total_bytes_reclaimed,
    );
    for record in &records {
        println!(
            "{} [{}] {} deleted, {} failed ({} bytes) via {}",
            record.scan_id, record.mode, record.deleted, record.failed, record.bytes_reclaimed, record.source,
        );
    }
    Ok(())
}
