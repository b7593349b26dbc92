//! `chunkedgraph ingest <plan>` (§4.L).

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chunkedgraph_graph::RawChunkDataSource;
use chunkedgraph_id::GraphLayout;
use chunkedgraph_ingest::{IngestPlan, IngestScheduler};
use chunkedgraph_node::ProcessConfig;
use chunkedgraph_store::StorageAdapter;
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::raw_source::{validate_raw_dir, DirRawChunkDataSource};

/// Exit `0` on full completion, `4` if any chunk task failed and needs
/// repair, `2` if the plan or raw data directory failed validation before
/// any work started.
pub fn run(
    config: &ProcessConfig,
    store: Arc<dyn StorageAdapter>,
    layout: GraphLayout,
    plan_path: PathBuf,
    raw_data_dir: PathBuf,
) -> CliResult<i32> {
    validate_raw_dir(&raw_data_dir).map_err(CliError::Args)?;
    let plan = IngestPlan::load(&plan_path)?;

    let source: Arc<dyn RawChunkDataSource> = Arc::new(DirRawChunkDataSource::new(raw_data_dir));
    let scheduler = IngestScheduler::new(store, layout, source, config.ingest_workers);
    let shutdown = Arc::new(AtomicBool::new(false));

    let summary = scheduler.run(&plan, shutdown)?;
    info!(
        completed = summary.chunks_completed,
        failed = summary.chunks_failed,
        "ingest command finished"
    );

    if summary.chunks_failed > 0 {
        Ok(4)
    } else {
        Ok(0)
    }
}
