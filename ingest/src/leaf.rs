//! Build layer-2 nodes from one atomic chunk's raw adjacency (§4.I).
//!
//! Each task owns exactly one atomic chunk and is responsible for every
//! atomic edge whose lower endpoint lies in it, per
//! [`chunkedgraph_graph::RawChunkDataSource`]'s contract -- so the atomic
//! adjacency columns for both endpoints of an edge are always written from
//! the single task that owns it, with no cross-task merge needed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chunkedgraph_graph::{pack_edge_pairs, pack_ids, Edge, RawChunkDataSource};
use chunkedgraph_id::{crossing_layer, ChunkCoord, GraphLayout, NodeId};
use chunkedgraph_store::{ColKey, DBCol, IdAllocator, Mutation, StorageAdapter};
use tracing::debug;

use crate::codec::{pack_f32s, pack_u32s};
use crate::error::{IngestError, IngestResult};
use crate::union_find::UnionFind;

/// The layer-2 node ids produced for one atomic chunk.
#[derive(Debug, Clone, Default)]
pub struct LeafSummary {
    pub chunk: ChunkCoord,
    pub nodes: Vec<NodeId>,
}

/// Fetch `chunk`'s raw adjacency, union-find its in-chunk connectivity into
/// layer-2 components, and write the hierarchy, cross-chunk-edge, and
/// atomic adjacency columns for it.
///
/// Idempotent: if `chunk` already has segments allocated (a prior run
/// completed, or a crash left a partial write that a retry will redo from
/// scratch), this is a no-op -- the caller's scheduler treats the chunk as
/// already done and moves on.
pub fn build(
    store: &Arc<dyn StorageAdapter>,
    layout: &GraphLayout,
    allocator: &IdAllocator,
    source: &dyn RawChunkDataSource,
    chunk: ChunkCoord,
) -> IngestResult<LeafSummary> {
    if allocator.segment_count(chunk)? > 0 {
        debug!(?chunk, "chunk already ingested, skipping");
        return Ok(LeafSummary { chunk, nodes: Vec::new() });
    }

    let raw_edges =
        source.atomic_edges(chunk).map_err(|e| IngestError::RawSource { chunk, source: e })?;
    let supervoxels =
        source.supervoxels(chunk).map_err(|e| IngestError::RawSource { chunk, source: e })?;
    let members: HashSet<NodeId> = supervoxels.iter().copied().collect();

    let mut uf = UnionFind::new();
    for &sv in &supervoxels {
        uf.find(sv);
    }
    let mut cross_by_member: HashMap<NodeId, Vec<Edge>> = HashMap::new();
    for e in raw_edges.iter() {
        if members.contains(&e.a) && members.contains(&e.b) {
            uf.union(e.a, e.b);
        } else {
            if members.contains(&e.a) {
                cross_by_member.entry(e.a).or_default().push(*e);
            }
            if members.contains(&e.b) {
                cross_by_member.entry(e.b).or_default().push(*e);
            }
        }
    }

    let mut components: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &sv in &supervoxels {
        components.entry(uf.find(sv)).or_default().push(sv);
    }

    let mut nodes = Vec::with_capacity(components.len());
    let mut mutations = Vec::new();

    for members_of_component in components.values() {
        let ids = allocator.allocate_segments(chunk, 1)?;
        let node_id = NodeId::encode(layout, 2, chunk.x, chunk.y, chunk.z, ids.start)?;
        nodes.push(node_id);

        mutations.push(Mutation::new(
            node_id.to_be_bytes().to_vec(),
            ColKey::plain(DBCol::HierarchyChildren),
            pack_ids(members_of_component),
        ));
        for &sv in members_of_component {
            mutations.push(Mutation::new(
                sv.to_be_bytes().to_vec(),
                ColKey::plain(DBCol::HierarchyParent),
                node_id.to_be_bytes().to_vec(),
            ));
        }

        let mut by_layer: HashMap<u8, Vec<(NodeId, NodeId)>> = HashMap::new();
        for &sv in members_of_component {
            for e in cross_by_member.get(&sv).into_iter().flatten() {
                let other = e.other(sv).expect("sv is one of this edge's endpoints");
                let k = crossing_layer(layout, sv, other);
                by_layer.entry(k).or_default().push((e.a, e.b));
            }
        }
        for (k, mut pairs) in by_layer {
            pairs.sort();
            pairs.dedup();
            mutations.push(Mutation::new(
                node_id.to_be_bytes().to_vec(),
                ColKey::layer(DBCol::ConnectivityCrossChunkEdges, k),
                pack_edge_pairs(&pairs),
            ));
        }
    }

    let mut partners: HashMap<NodeId, Vec<(NodeId, Option<f32>, Option<u32>)>> = HashMap::new();
    for e in raw_edges.iter() {
        partners.entry(e.a).or_default().push((e.b, e.affinity, e.area));
        partners.entry(e.b).or_default().push((e.a, e.affinity, e.area));
    }
    for (sv, mut adjacent) in partners {
        adjacent.sort_by_key(|(p, _, _)| *p);
        let ids: Vec<NodeId> = adjacent.iter().map(|(p, _, _)| *p).collect();
        let affinities: Vec<f32> = adjacent.iter().map(|(_, a, _)| a.unwrap_or(0.0)).collect();
        let areas: Vec<u32> = adjacent.iter().map(|(_, _, a)| a.unwrap_or(0)).collect();
        mutations.push(Mutation::new(
            sv.to_be_bytes().to_vec(),
            ColKey::plain(DBCol::ConnectivityAtomicPartners),
            pack_ids(&ids),
        ));
        mutations.push(Mutation::new(
            sv.to_be_bytes().to_vec(),
            ColKey::plain(DBCol::ConnectivityAtomicAffinities),
            pack_f32s(&affinities),
        ));
        mutations.push(Mutation::new(
            sv.to_be_bytes().to_vec(),
            ColKey::plain(DBCol::ConnectivityAtomicAreas),
            pack_u32s(&areas),
        ));
    }

    store.write(mutations, &[])?;
    Ok(LeafSummary { chunk, nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedgraph_store::MemAdapter;
    use std::sync::Mutex;

    struct FixedSource {
        edges: chunkedgraph_graph::EdgeSet,
        supervoxels: HashMap<ChunkCoord, Vec<NodeId>>,
        calls: Mutex<u32>,
    }

    impl RawChunkDataSource for FixedSource {
        fn atomic_edges(&self, _chunk: ChunkCoord) -> std::io::Result<chunkedgraph_graph::EdgeSet> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.edges.clone())
        }

        fn supervoxels(&self, chunk: ChunkCoord) -> std::io::Result<Vec<NodeId>> {
            Ok(self.supervoxels.get(&chunk).cloned().unwrap_or_default())
        }
    }

    fn sv(layout: &GraphLayout, chunk: ChunkCoord, seg: u64) -> NodeId {
        NodeId::encode(layout, 1, chunk.x, chunk.y, chunk.z, seg).unwrap()
    }

    #[test]
    fn one_component_per_in_chunk_connected_group() {
        let layout = GraphLayout::for_test();
        let chunk = ChunkCoord::new(1, 0, 0, 0);
        let a = sv(&layout, chunk, 0);
        let b = sv(&layout, chunk, 1);
        let c = sv(&layout, chunk, 2);

        let mut edges = chunkedgraph_graph::EdgeSet::new();
        edges.push(Edge::new(a, b, Some(1.0), Some(10)));

        let source = FixedSource {
            edges,
            supervoxels: HashMap::from([(chunk, vec![a, b, c])]),
            calls: Mutex::new(0),
        };
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let allocator = IdAllocator::new(store.clone());

        let summary = build(&store, &layout, &allocator, &source, chunk).unwrap();
        assert_eq!(summary.nodes.len(), 2, "{{a,b}} and {{c}} are separate components");
    }

    #[test]
    fn rebuilding_an_already_ingested_chunk_is_a_no_op() {
        let layout = GraphLayout::for_test();
        let chunk = ChunkCoord::new(1, 0, 0, 0);
        let a = sv(&layout, chunk, 0);
        let source = FixedSource {
            edges: chunkedgraph_graph::EdgeSet::new(),
            supervoxels: HashMap::from([(chunk, vec![a])]),
            calls: Mutex::new(0),
        };
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let allocator = IdAllocator::new(store.clone());

        let first = build(&store, &layout, &allocator, &source, chunk).unwrap();
        assert_eq!(first.nodes.len(), 1);
        let second = build(&store, &layout, &allocator, &source, chunk).unwrap();
        assert!(second.nodes.is_empty());
        assert_eq!(*source.calls.lock().unwrap(), 1, "raw source is read exactly once");
    }

    #[test]
    fn cross_edge_is_bucketed_under_its_crossing_layer() {
        let layout = GraphLayout::for_test();
        let chunk = ChunkCoord::new(1, 0, 0, 0);
        let neighbor = ChunkCoord::new(1, 0, 0, 1);
        let a = sv(&layout, chunk, 0);
        let b = sv(&layout, neighbor, 0);

        let mut edges = chunkedgraph_graph::EdgeSet::new();
        edges.push(Edge::new(a, b, Some(0.5), Some(4)));
        let source = FixedSource {
            edges,
            supervoxels: HashMap::from([(chunk, vec![a])]),
            calls: Mutex::new(0),
        };
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let allocator = IdAllocator::new(store.clone());

        let summary = build(&store, &layout, &allocator, &source, chunk).unwrap();
        let node = summary.nodes[0];
        let col = ColKey::layer(DBCol::ConnectivityCrossChunkEdges, crossing_layer(&layout, a, b));
        let row = store.read_row(&node.to_be_bytes(), Some(&[col.clone()]), None).unwrap();
        assert!(row.get(&col).is_some());
    }
}
