//! `chunkedgraph repair --since <ts>` (§4.L), grounded directly on
//! `original_source/pychunkedgraph/jobs/repair/main.py`'s
//! `_repair_failed_operations`/`_repair_operation`.
//!
//! Only entries logged `Failed` whose roots still carry the indefinite
//! lock marker are candidates: that marker is set exactly once, by
//! `Editor::run`'s `CommitFailed` branch, so a `Failed` entry without it
//! means compute itself rejected the edit and the roots were cleanly
//! unlocked already -- nothing to repair.

use std::sync::Arc;

use chunkedgraph_graph::{
    Editor, LockManager, MergeRequest, NullOperationLogSink, OperationLogEntry, OperationStatus,
    SplitRequest,
};
use chunkedgraph_id::GraphLayout;
use chunkedgraph_store::{DBCol, StorageAdapter};
use tracing::{info, warn};

use crate::error::CliResult;

/// Exit `0` if every scanned entry was repaired, `4` if any remain failed.
pub fn run(store: Arc<dyn StorageAdapter>, layout: GraphLayout, since_ms: u64) -> CliResult<i32> {
    let locks = LockManager::new(store.clone());
    let editor = Editor::new(store.clone(), layout).with_log_sink(Arc::new(NullOperationLogSink));

    let rows = store.scan_range(DBCol::OperationLog, &[0u8; 8], &[0xffu8; 8], None)?;
    let mut repaired = 0u64;
    let mut remaining_failed = 0u64;

    for (_, cells) in rows {
        let Some(cell) = cells.first() else { continue };
        let Ok(entry) = serde_json::from_slice::<OperationLogEntry>(&cell.value) else { continue };
        if entry.status != OperationStatus::Failed || entry.client_timestamp_ms < since_ms {
            continue;
        }

        let stuck: Vec<_> = entry
            .old_roots
            .iter()
            .copied()
            .filter(|&r| locks.is_indefinitely_locked(r).unwrap_or(false))
            .collect();
        if stuck.is_empty() {
            continue;
        }

        // Bypass the normal retry backoff: the lock is known stuck, so
        // clear it up front rather than letting `Editor::merge`/`split`
        // burn through their own retry budget against a dead op id.
        for &root in &stuck {
            if let Err(e) = locks.force_unlock(root) {
                warn!(op_id = entry.op_id, root = %root, error = %e, "failed to clear stuck lock");
            }
        }

        let result = if let Some((a, b)) = entry.added_edges.first().copied() {
            editor.merge(MergeRequest {
                source: a,
                sink: b,
                affinity: None,
                user: format!("repair/{}", entry.user),
                client_timestamp_ms: entry.client_timestamp_ms,
            })
        } else if !entry.removed_edges.is_empty() {
            editor.split(SplitRequest {
                removed_edges: entry.removed_edges.clone(),
                user: format!("repair/{}", entry.user),
                client_timestamp_ms: entry.client_timestamp_ms,
            })
        } else {
            warn!(op_id = entry.op_id, "failed operation has no recorded edge delta, skipping");
            remaining_failed += 1;
            continue;
        };

        match result {
            Ok(outcome) => {
                for &root in &stuck {
                    let _ = locks.clear_indefinite(root);
                }
                info!(op_id = entry.op_id, new_op_id = outcome.op_id, "repaired operation");
                repaired += 1;
            }
            Err(e) => {
                warn!(op_id = entry.op_id, error = %e, "repair re-execution failed");
                remaining_failed += 1;
            }
        }
    }

    info!(repaired, remaining_failed, "repair run finished");
    if remaining_failed > 0 {
        Ok(4)
    } else {
        Ok(0)
    }
}
