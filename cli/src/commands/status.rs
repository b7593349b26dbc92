//! `chunkedgraph status` (§4.L): a read-only snapshot. Exit `0` unless
//! storage itself is unreachable.

use std::sync::Arc;

use chunkedgraph_graph::{OperationLogEntry, OperationStatus};
use chunkedgraph_id::GraphLayout;
use chunkedgraph_store::{DBCol, GraphMeta, LockCell, StorageAdapter};

use crate::error::CliResult;

pub fn run(store: Arc<dyn StorageAdapter>, layout: GraphLayout) -> CliResult<i32> {
    let meta = GraphMeta::read_or_err(store.as_ref())?;
    println!("layer count:    {}", layout.top_layer);
    println!("fanout:         {}", layout.fanout);
    println!("chunk size:     {:?}", meta.chunk_size);
    println!("dataset bounds: {:?}", meta.dataset_bounds);

    let roots = count_top_layer_segments(store.as_ref(), layout.top_layer)?;
    println!("top-layer roots (best-effort, includes historical): {roots}");

    let (live_locks, indefinite_locks) = count_locks(store.as_ref())?;
    println!("live root locks: {live_locks}");
    println!("indefinite (needs-repair) locks: {indefinite_locks}");

    let pending_repairs = count_failed_operations(store.as_ref())?;
    println!("operation log entries marked failed: {pending_repairs}");

    Ok(0)
}

fn count_top_layer_segments(store: &dyn StorageAdapter, top_layer: u8) -> CliResult<u64> {
    let start = vec![top_layer];
    let end = vec![top_layer.saturating_add(1)];
    let rows = store.scan_range(DBCol::ChunkSegmentCounter, &start, &end, None)?;
    let mut total = 0u64;
    for (_, cells) in rows {
        if let Some(cell) = cells.first() {
            total += u64::from_be_bytes(cell.value.clone().try_into().unwrap_or([0; 8]));
        }
    }
    Ok(total)
}

fn count_locks(store: &dyn StorageAdapter) -> CliResult<(u64, u64)> {
    let now = store.now();
    let rows = store.scan_range(DBCol::ConcurrencyLock, &[0u8; 8], &[0xffu8; 8], None)?;
    let live = rows
        .iter()
        .filter_map(|(_, cells)| cells.first())
        .filter_map(|cell| LockCell::decode(&cell.value))
        .filter(|lock| lock.indefinite || lock.expires_at >= now)
        .count() as u64;

    let indefinite = store
        .scan_range(DBCol::ConcurrencyIndefiniteLock, &[0u8; 8], &[0xffu8; 8], None)?
        .len() as u64;

    Ok((live, indefinite))
}

fn count_failed_operations(store: &dyn StorageAdapter) -> CliResult<u64> {
    let rows = store.scan_range(DBCol::OperationLog, &[0u8; 8], &[0xffu8; 8], None)?;
    let count = rows
        .iter()
        .filter_map(|(_, cells)| cells.first())
        .filter_map(|cell| serde_json::from_slice::<OperationLogEntry>(&cell.value).ok())
        .filter(|entry| entry.status == OperationStatus::Failed)
        .count() as u64;
    Ok(count)
}
