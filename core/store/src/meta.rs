use std::sync::Arc;

use chunkedgraph_id::GraphLayout;
use serde::{Deserialize, Serialize};

use crate::adapter::{Mutation, StorageAdapter};
use crate::cell::ColKey;
use crate::columns::DBCol;
use crate::error::{StoreError, StoreResult};

const META_KEY: &[u8] = b"graph_meta";

/// Chunk-global graph metadata, written once at graph creation (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMeta {
    pub layout: GraphLayout,
    pub chunk_size: [u32; 3],
    pub dataset_bounds: [u32; 6],
}

impl GraphMeta {
    pub fn write(&self, store: &dyn StorageAdapter) -> StoreResult<()> {
        let value = serde_json::to_vec(self)
            .map_err(|e| StoreError::CorruptValue { col: "GraphMeta", reason: e.to_string() })?;
        let mutation = Mutation::new(META_KEY.to_vec(), ColKey::plain(DBCol::GraphMeta), value);
        store.write(vec![mutation], &[])?;
        Ok(())
    }

    pub fn read(store: &dyn StorageAdapter) -> StoreResult<Option<Self>> {
        let col = ColKey::plain(DBCol::GraphMeta);
        let row = store.read_row(META_KEY, Some(&[col.clone()]), None)?;
        let Some(cells) = row.get(&col) else { return Ok(None) };
        let Some(cell) = cells.first() else { return Ok(None) };
        let meta: GraphMeta = serde_json::from_slice(&cell.value)
            .map_err(|e| StoreError::CorruptValue { col: "GraphMeta", reason: e.to_string() })?;
        Ok(Some(meta))
    }

    pub fn read_or_err(store: &dyn StorageAdapter) -> StoreResult<Self> {
        Self::read(store)?.ok_or_else(|| StoreError::NotFound(META_KEY.to_vec()))
    }
}

pub fn load_layout(store: &Arc<dyn StorageAdapter>) -> StoreResult<GraphLayout> {
    Ok(GraphMeta::read_or_err(store.as_ref())?.layout)
}
