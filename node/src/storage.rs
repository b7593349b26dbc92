use std::sync::Arc;

use chunkedgraph_id::GraphLayout;
use chunkedgraph_store::{GraphMeta, RocksAdapter, StorageAdapter};

use crate::config::ProcessConfig;
use crate::error::ConfigResult;

/// Open the RocksDB-backed storage adapter named by `config` and load the
/// graph's durable metadata from it. Used by every CLI subcommand so the
/// "open storage, read layout" sequence lives in exactly one place.
pub fn open(config: &ProcessConfig) -> ConfigResult<(Arc<dyn StorageAdapter>, GraphLayout)> {
    let adapter = RocksAdapter::open(&config.storage_path)?;
    let store: Arc<dyn StorageAdapter> = Arc::new(adapter);
    let layout = GraphMeta::read_or_err(store.as_ref())?.layout;
    Ok((store, layout))
}
