use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chunkedgraph_id::{ChunkCoord, GraphLayout};
use parking_lot::Mutex;

const SHARD_COUNT: usize = 16;

/// The `{parent_chunk: remaining_children}` map from §4.I, sharded by a
/// hash of the parent chunk so concurrent completions from unrelated
/// subtrees don't contend on one lock.
pub struct PendingParents {
    shards: Vec<Mutex<HashMap<ChunkCoord, u32>>>,
}

impl PendingParents {
    /// Precompute remaining-children counts for every parent chunk implied
    /// by `levels` (the output of [`crate::IngestPlan::levels`]).
    pub fn new(levels: &[Vec<ChunkCoord>], layout: &GraphLayout) -> Self {
        let shards: Vec<Mutex<HashMap<ChunkCoord, u32>>> =
            (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        let pending = Self { shards };
        for children in &levels[..levels.len().saturating_sub(1)] {
            for &child in children {
                let parent = child.parent(layout);
                let mut shard = pending.shard(parent).lock();
                *shard.entry(parent).or_insert(0) += 1;
            }
        }
        pending
    }

    fn shard(&self, chunk: ChunkCoord) -> &Mutex<HashMap<ChunkCoord, u32>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        chunk.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Parent chunks still waiting on at least one child, summed across
    /// shards. For the `chunkedgraph_ingest_pending_parents` gauge.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Record that `chunk` finished. Returns its parent chunk if this was
    /// the last outstanding child, making the parent task ready to enqueue.
    /// Returns `None` for a chunk at the top layer (no parent to notify) or
    /// if its parent still has other children outstanding.
    pub fn complete(&self, chunk: ChunkCoord, layout: &GraphLayout) -> Option<ChunkCoord> {
        if chunk.layer >= layout.top_layer {
            return None;
        }
        let parent = chunk.parent(layout);
        let mut shard = self.shard(parent).lock();
        let remaining = shard.get_mut(&parent)?;
        *remaining -= 1;
        if *remaining == 0 {
            shard.remove(&parent);
            Some(parent)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_ready_only_after_every_child_completes() {
        let layout = GraphLayout::for_test();
        let children = vec![
            ChunkCoord::new(2, 0, 0, 0),
            ChunkCoord::new(2, 0, 0, 1),
            ChunkCoord::new(2, 0, 1, 0),
            ChunkCoord::new(2, 0, 1, 1),
            ChunkCoord::new(2, 1, 0, 0),
            ChunkCoord::new(2, 1, 0, 1),
            ChunkCoord::new(2, 1, 1, 0),
            ChunkCoord::new(2, 1, 1, 1),
        ];
        let parent_level: Vec<ChunkCoord> = {
            let mut v: Vec<_> = children.iter().map(|c| c.parent(&layout)).collect();
            v.sort();
            v.dedup();
            v
        };
        let pending = PendingParents::new(&[children.clone(), parent_level], &layout);

        for &child in &children[..7] {
            assert_eq!(pending.complete(child, &layout), None);
        }
        assert_eq!(pending.complete(children[7], &layout), Some(children[0].parent(&layout)));
    }
}
