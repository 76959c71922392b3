use crate::error::{DeletionError, DeletionResult};
use crate::types::{DeletePlan, DeletionPolicy, ExecutableOperation, ExecutablePlan};

/// Validates a UI intent plan and enriches it into an [`ExecutablePlan`].
///
/// Every violation is collected before failing, so a UI can surface the
/// whole list in one pass rather than fixing one keeper at a time. A
/// missing delete path is not a violation: it is skipped silently to
/// tolerate races between review and execution.
pub fn build_delete_plan(plan: &DeletePlan) -> DeletionResult<ExecutablePlan> {
    let mut operations = Vec::new();
    let mut errors = Vec::new();

    for group in &plan.groups {
        if !group.keep.exists() {
            errors.push(format!(
                "group {}: keeper missing: {}",
                group.group_index,
                group.keep.display()
            ));
            continue;
        }
        let keep_resolved = group.keep.canonicalize().unwrap_or_else(|_| group.keep.clone());

        for delete_path in &group.delete {
            if !delete_path.exists() {
                // Skip this file only; race between review and execution.
                continue;
            }

            let delete_resolved = delete_path
                .canonicalize()
                .unwrap_or_else(|_| delete_path.clone());
            if delete_resolved == keep_resolved {
                errors.push(format!(
                    "group {}: keeper included in delete set: {}",
                    group.group_index,
                    delete_path.display()
                ));
                continue;
            }

            let (size, mtime) = match std::fs::metadata(delete_path) {
                Ok(meta) => (
                    meta.len(),
                    meta.modified()
                        .ok()
                        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                        .map(|d| d.as_secs_f64())
                        .unwrap_or(0.0),
                ),
                Err(_) => (0, 0.0),
            };

            operations.push(ExecutableOperation {
                path: delete_path.clone(),
                size,
                group_index: group.group_index,
                kept_path: group.keep.clone(),
                mtime,
            });
        }
    }

    if !errors.is_empty() {
        return Err(DeletionError::InvalidPlan(errors.join("; ")));
    }
    if !plan.groups.is_empty() && operations.is_empty() {
        return Err(DeletionError::InvalidPlan(
            "groups present but no valid operations (all keepers missing or all delete paths stale)"
                .to_string(),
        ));
    }

    Ok(ExecutablePlan {
        scan_id: plan.scan_id.clone(),
        mode: plan.policy.mode,
        operations,
        source: plan.source.clone(),
    })
}
