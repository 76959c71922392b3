use tracing::{info, warn};

use crate::adapters::delete_one;
use crate::types::{BatchDeletionResult, ExecutablePlan};

/// Executes every operation in `plan` strictly sequentially.
///
/// `progress` is invoked as `(current, total, file_name)` before each
/// attempt; returning `false` stops the batch early, preserving counts
/// accumulated so far. An error on one operation never aborts the batch by
/// itself.
pub fn execute_plan<F>(plan: &ExecutablePlan, mut progress: F) -> BatchDeletionResult
where
    F: FnMut(usize, usize, &str) -> bool,
{
    let total = plan.operations.len();
    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    let mut bytes_reclaimed = 0u64;

    for (i, op) in plan.operations.iter().enumerate() {
        let file_name = op
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !progress(i + 1, total, &file_name) {
            info!(scan_id = %plan.scan_id, "deletion cancelled by caller");
            break;
        }

        let outcome = delete_one(&op.path, plan.mode);
        if outcome.is_success() {
            bytes_reclaimed += outcome.bytes_reclaimed;
            deleted.push(outcome.path);
        } else {
            let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(path = %op.path.display(), %reason, "deletion failed");
            failed.push((outcome.path, reason));
        }
    }

    BatchDeletionResult {
        scan_id: plan.scan_id.clone(),
        mode: plan.mode,
        deleted,
        failed,
        bytes_reclaimed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::build_delete_plan;
    use crate::types::{DeletePlan, DeletionMode, DeletionPolicy, PlanGroup};

    fn write(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"content").unwrap();
        path
    }

    #[test]
    fn executes_every_operation_when_progress_always_continues() {
        let dir = tempfile::tempdir().unwrap();
        let keep = write(dir.path(), "keep.bin");
        let a = write(dir.path(), "a.bin");
        let b = write(dir.path(), "b.bin");
        let plan = DeletePlan {
            scan_id: "s1".into(),
            policy: DeletionPolicy { mode: DeletionMode::Permanent },
            groups: vec![PlanGroup {
                group_index: 0,
                keep,
                delete: vec![a.clone(), b.clone()],
            }],
            source: "test".into(),
        };
        let executable = build_delete_plan(&plan).unwrap();
        let result = execute_plan(&executable, |_, _, _| true);
        assert_eq!(result.deleted.len(), 2);
        assert!(result.failed.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[test]
    fn progress_callback_returning_false_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let keep = write(dir.path(), "keep.bin");
        let a = write(dir.path(), "a.bin");
        let b = write(dir.path(), "b.bin");
        let plan = DeletePlan {
            scan_id: "s1".into(),
            policy: DeletionPolicy { mode: DeletionMode::Permanent },
            groups: vec![PlanGroup {
                group_index: 0,
                keep,
                delete: vec![a.clone(), b.clone()],
            }],
            source: "test".into(),
        };
        let executable = build_delete_plan(&plan).unwrap();
        let result = execute_plan(&executable, |current, _, _| current < 1);
        assert_eq!(result.deleted.len(), 0);
        assert!(a.exists());
        assert!(b.exists());
    }
}
