use std::path::Path;

use chunkedgraph_id::{ChunkCoord, GraphLayout};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, IngestResult};

/// An ingestion plan: the layer-2 chunk coordinates derived from dataset
/// bounds (§4.I). Each entry names one atomic chunk whose raw adjacency
/// will be read and turned into one or more layer-2 nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPlan {
    pub layer2_chunks: Vec<ChunkCoord>,
}

impl IngestPlan {
    /// Enumerate every layer-2 chunk covering `dataset_bounds` (voxel
    /// `[x0, y0, z0, x1, y1, z1]`) tiled by `chunk_size` voxels per axis.
    pub fn from_dataset_bounds(dataset_bounds: [u32; 6], chunk_size: [u32; 3]) -> Self {
        let dims = [
            dataset_bounds[3].saturating_sub(dataset_bounds[0]),
            dataset_bounds[4].saturating_sub(dataset_bounds[1]),
            dataset_bounds[5].saturating_sub(dataset_bounds[2]),
        ];
        let counts: Vec<u64> = (0..3)
            .map(|i| {
                let size = chunk_size[i].max(1) as u64;
                (dims[i] as u64 + size - 1) / size
            })
            .collect();

        let mut layer2_chunks = Vec::with_capacity((counts[0] * counts[1] * counts[2]) as usize);
        for x in 0..counts[0] {
            for y in 0..counts[1] {
                for z in 0..counts[2] {
                    layer2_chunks.push(ChunkCoord::new(2, x, y, z));
                }
            }
        }
        Self { layer2_chunks }
    }

    pub fn load(path: &Path) -> IngestResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IngestError::InvalidPlan(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| IngestError::InvalidPlan(e.to_string()))
    }

    /// The full chunk list for every layer from 2 up to `layout.top_layer`,
    /// indexed by `layer - 2`: layer 2 is the plan itself, and each layer
    /// above is the deduplicated set of its children's parent chunks. This
    /// is computed once up front so the scheduler's dependency counts are
    /// static rather than discovered reactively -- the spec permits either;
    /// a precomputed plan is simpler to make idempotent across restarts.
    pub fn levels(&self, layout: &GraphLayout) -> Vec<Vec<ChunkCoord>> {
        let mut levels = vec![self.layer2_chunks.clone()];
        loop {
            let prev = levels.last().unwrap();
            let Some(first) = prev.first() else { break };
            if first.layer >= layout.top_layer {
                break;
            }
            let mut next: Vec<ChunkCoord> = prev.iter().map(|c| c.parent(layout)).collect();
            next.sort();
            next.dedup();
            levels.push(next);
        }
        levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_bounds_cover_every_voxel() {
        let plan = IngestPlan::from_dataset_bounds([0, 0, 0, 256, 256, 128], [128, 128, 128]);
        assert_eq!(plan.layer2_chunks.len(), 2 * 2 * 1);
    }

    #[test]
    fn levels_shrink_toward_the_root() {
        let layout = GraphLayout::for_test();
        let plan = IngestPlan::from_dataset_bounds([0, 0, 0, 256, 256, 256], [128, 128, 128]);
        let levels = plan.levels(&layout);
        assert_eq!(levels.first().unwrap().len(), 8);
        assert_eq!(levels.last().unwrap().len(), 1);
        assert_eq!(levels.last().unwrap()[0].layer, layout.top_layer);
    }
}
