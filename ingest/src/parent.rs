//! Build layer-`k` nodes from their layer-`(k-1)` children (§4.I).
//!
//! Higher-layer nodes never store their own cross-chunk-edge column --
//! only layer-2 rows do (§3) -- so this step borrows
//! [`chunkedgraph_graph::HierarchyReadService::cross_chunk_edges`] to pull
//! each child's share of that data back up from its bounding layer-2
//! descendants, rather than re-deriving the column decoding here. Its
//! crossing-layer bucketing is a coarse one (everything at or above a
//! node's own layer lands in a single bucket keyed by that layer, see
//! `read.rs`), so this step resolves each candidate edge's endpoints up to
//! the child layer itself and only treats it as internal when both sides
//! land inside the parent chunk's own children -- edges that still cross
//! further out are simply left where they are, to be found again the next
//! time a higher layer queries the same layer-2 descendants.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chunkedgraph_graph::{pack_ids, HierarchyReadService};
use chunkedgraph_id::{ChunkCoord, GraphLayout, NodeId};
use chunkedgraph_store::{ColKey, DBCol, IdAllocator, Mutation, StorageAdapter};

use crate::error::IngestResult;
use crate::union_find::UnionFind;

/// The layer-`k` node ids produced for one ancestor chunk.
#[derive(Debug, Clone, Default)]
pub struct ParentSummary {
    pub chunk: ChunkCoord,
    pub nodes: Vec<NodeId>,
}

/// Idempotent, like [`crate::leaf::build`]: a chunk whose segment counter
/// is already nonzero is assumed already built.
pub fn build(
    store: &Arc<dyn StorageAdapter>,
    layout: &GraphLayout,
    allocator: &IdAllocator,
    read: &HierarchyReadService,
    chunk: ChunkCoord,
) -> IngestResult<ParentSummary> {
    if allocator.segment_count(chunk)? > 0 {
        return Ok(ParentSummary { chunk, nodes: Vec::new() });
    }

    let child_layer = chunk.layer - 1;
    let mut children = Vec::new();
    for child_chunk in chunk.descendant_chunks(layout, child_layer) {
        let count = allocator.segment_count(child_chunk)?;
        for seg in 0..count {
            children.push(NodeId::encode(
                layout,
                child_layer,
                child_chunk.x,
                child_chunk.y,
                child_chunk.z,
                seg,
            )?);
        }
    }
    if children.is_empty() {
        return Ok(ParentSummary { chunk, nodes: Vec::new() });
    }
    let child_set: HashSet<NodeId> = children.iter().copied().collect();

    let mut uf = UnionFind::new();
    for &c in &children {
        uf.find(c);
    }

    let cross = read.cross_chunk_edges(&children, false)?;
    if let Some(candidates) = cross.get(&child_layer) {
        for edge in candidates.iter() {
            let (a, b) = edge.endpoints();
            let pa = read.root(a, child_layer, true, None, 8)?;
            let pb = read.root(b, child_layer, true, None, 8)?;
            if child_set.contains(&pa) && child_set.contains(&pb) {
                uf.union(pa, pb);
            }
        }
    }

    let mut components: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &c in &children {
        components.entry(uf.find(c)).or_default().push(c);
    }

    let mut nodes = Vec::with_capacity(components.len());
    let mut mutations = Vec::new();
    for members in components.values() {
        let ids = allocator.allocate_segments(chunk, 1)?;
        let node_id = NodeId::encode(layout, chunk.layer, chunk.x, chunk.y, chunk.z, ids.start)?;
        nodes.push(node_id);
        mutations.push(Mutation::new(
            node_id.to_be_bytes().to_vec(),
            ColKey::plain(DBCol::HierarchyChildren),
            pack_ids(members),
        ));
        for &m in members {
            mutations.push(Mutation::new(
                m.to_be_bytes().to_vec(),
                ColKey::plain(DBCol::HierarchyParent),
                node_id.to_be_bytes().to_vec(),
            ));
        }
    }
    store.write(mutations, &[])?;
    Ok(ParentSummary { chunk, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedgraph_graph::{Edge, RawChunkDataSource};
    use chunkedgraph_store::MemAdapter;

    #[test]
    fn two_children_joined_by_a_crossing_edge_merge_into_one_parent() {
        let layout = GraphLayout::for_test();
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let allocator = IdAllocator::new(store.clone());

        let left_chunk = ChunkCoord::new(1, 0, 0, 0);
        let right_chunk = ChunkCoord::new(1, 0, 0, 1);
        let a = NodeId::encode(&layout, 1, 0, 0, 0, 0).unwrap();
        let b = NodeId::encode(&layout, 1, 0, 0, 1, 0).unwrap();

        let mut edges = chunkedgraph_graph::EdgeSet::new();
        edges.push(Edge::new(a, b, Some(1.0), Some(5)));
        struct Source(chunkedgraph_graph::EdgeSet, HashMap<ChunkCoord, Vec<NodeId>>);
        impl RawChunkDataSource for Source {
            fn atomic_edges(
                &self,
                chunk: ChunkCoord,
            ) -> std::io::Result<chunkedgraph_graph::EdgeSet> {
                if chunk.x == 0 && chunk.y == 0 && chunk.z == 0 {
                    Ok(self.0.clone())
                } else {
                    Ok(chunkedgraph_graph::EdgeSet::new())
                }
            }
            fn supervoxels(&self, chunk: ChunkCoord) -> std::io::Result<Vec<NodeId>> {
                Ok(self.1.get(&chunk).cloned().unwrap_or_default())
            }
        }
        let source = Source(edges, HashMap::from([(left_chunk, vec![a]), (right_chunk, vec![b])]));

        crate::leaf::build(&store, &layout, &allocator, &source, left_chunk).unwrap();
        crate::leaf::build(&store, &layout, &allocator, &source, right_chunk).unwrap();

        let parent_chunk = left_chunk.parent(&layout);
        let read = HierarchyReadService::new(store.clone(), layout);
        let summary = build(&store, &layout, &allocator, &read, parent_chunk).unwrap();
        assert_eq!(summary.nodes.len(), 1);
    }

    #[test]
    fn rebuilding_an_already_built_parent_chunk_is_a_no_op() {
        let layout = GraphLayout::for_test();
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let allocator = IdAllocator::new(store.clone());
        let leaf_chunk = ChunkCoord::new(1, 0, 0, 0);
        let a = NodeId::encode(&layout, 1, 0, 0, 0, 0).unwrap();
        let source = Source2(HashMap::from([(leaf_chunk, vec![a])]));
        struct Source2(HashMap<ChunkCoord, Vec<NodeId>>);
        impl RawChunkDataSource for Source2 {
            fn atomic_edges(&self, _chunk: ChunkCoord) -> std::io::Result<chunkedgraph_graph::EdgeSet> {
                Ok(chunkedgraph_graph::EdgeSet::new())
            }
            fn supervoxels(&self, chunk: ChunkCoord) -> std::io::Result<Vec<NodeId>> {
                Ok(self.0.get(&chunk).cloned().unwrap_or_default())
            }
        }
        crate::leaf::build(&store, &layout, &allocator, &source, leaf_chunk).unwrap();
        let parent_chunk = leaf_chunk.parent(&layout);
        let read = HierarchyReadService::new(store.clone(), layout);

        let first = build(&store, &layout, &allocator, &read, parent_chunk).unwrap();
        assert_eq!(first.nodes.len(), 1);
        let second = build(&store, &layout, &allocator, &read, parent_chunk).unwrap();
        assert!(second.nodes.is_empty());
    }
}
