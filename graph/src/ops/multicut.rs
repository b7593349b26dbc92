use std::collections::HashSet;
use std::sync::Arc;

use chunkedgraph_id::NodeId;

use crate::error::{GraphError, GraphResult};
use crate::external::MinCutSolver;
use crate::oplog::OperationKind;
use crate::read::BBox;

use super::{EditOutcome, Editor};

/// A multicut request: separate `sources` from `sinks` within their shared
/// component by solving for a minimum edge cut within a bounded region, then
/// applying the cut as a split (§4.H Multicut).
#[derive(Debug, Clone)]
pub struct MulticutRequest {
    pub sources: Vec<NodeId>,
    pub sinks: Vec<NodeId>,
    /// Expansion, in layer-1 chunk units, of the axis-aligned box spanning
    /// `sources` union `sinks` that the min-cut search is bounded to (§4.H).
    pub bbox_offset: [u32; 3],
    pub user: String,
    pub client_timestamp_ms: u64,
}

impl Editor {
    pub fn multicut(&self, req: MulticutRequest, solver: Arc<dyn MinCutSolver>) -> GraphResult<EditOutcome> {
        if req.sources.is_empty() || req.sinks.is_empty() {
            return Err(GraphError::PreconditionError(
                "multicut requires at least one source and one sink".into(),
            ));
        }

        let top = self.read().layout().top_layer;
        let mut roots = HashSet::new();
        for &id in req.sources.iter().chain(req.sinks.iter()) {
            roots.insert(self.read().root(id, top, true, None, 8)?);
        }
        if roots.len() != 1 {
            return Err(GraphError::PreconditionError(
                "multicut sources and sinks must share one component".into(),
            ));
        }
        let root = *roots.iter().next().unwrap();

        let layout = self.read().layout();
        let endpoints: Vec<NodeId> = req.sources.iter().chain(req.sinks.iter()).copied().collect();
        let bbox = bbox_from_endpoints(layout, &endpoints, req.bbox_offset);

        let local = self.read().subgraph(&[root], Some(bbox), crate::read::SubgraphMode::Both)?;
        let members: HashSet<NodeId> = local.supervoxels.into_iter().collect();
        let mut edges = crate::edges::EdgeSet::new();
        for e in local.edges.iter() {
            if members.contains(&e.a) && members.contains(&e.b) {
                edges.push(*e);
            }
        }
        let cross = self.read().cross_chunk_edges(&[root], false)?;
        for (_, set) in cross {
            for e in set.iter() {
                if members.contains(&e.a) && members.contains(&e.b) {
                    edges.push(*e);
                }
            }
        }

        let cut = solver.min_cut(&edges, &req.sources, &req.sinks).ok_or_else(|| {
            GraphError::PreconditionError(
                "no cut separating sources from sinks exists within the requested bounding box".into(),
            )
        })?;

        self.split_edges(
            cut.iter().map(|e| e.endpoints()).collect(),
            OperationKind::Multicut,
            req.user,
            req.client_timestamp_ms,
            Some(bbox),
            Some(req.bbox_offset),
        )
    }
}

/// The axis-aligned box, in layer-1 chunk units, spanning `ids` and expanded
/// by `offset` on every side (§4.H).
fn bbox_from_endpoints(layout: &chunkedgraph_id::GraphLayout, ids: &[NodeId], offset: [u32; 3]) -> BBox {
    let mut min = [u64::MAX; 3];
    let mut max = [0u64; 3];
    for &id in ids {
        let chunk = id.chunk(layout);
        let coords = [chunk.x, chunk.y, chunk.z];
        for i in 0..3 {
            min[i] = min[i].min(coords[i]);
            max[i] = max[i].max(coords[i]);
        }
    }
    let offset = [offset[0] as u64, offset[1] as u64, offset[2] as u64];
    BBox {
        min: [min[0].saturating_sub(offset[0]), min[1].saturating_sub(offset[1]), min[2].saturating_sub(offset[2])],
        max: [max[0] + 1 + offset[0], max[1] + 1 + offset[1], max[2] + 1 + offset[2]],
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunkedgraph_id::GraphLayout;

    use super::super::test_support::{new_store, supervoxel, write_chain, FixedChunkEdges};
    use super::*;
    use crate::edges::{Edge, EdgeSet};
    use crate::Editor;

    /// Always returns the same fixed cut, ignoring the candidate edge set and
    /// source/sink lists -- enough to drive the operation through a known
    /// multi-edge cut deterministically.
    struct FixedCutSolver(Vec<Edge>);

    impl crate::external::MinCutSolver for FixedCutSolver {
        fn min_cut(&self, _edges: &EdgeSet, _sources: &[NodeId], _sinks: &[NodeId]) -> Option<Vec<Edge>> {
            Some(self.0.clone())
        }
    }

    struct NoCutSolver;

    impl crate::external::MinCutSolver for NoCutSolver {
        fn min_cut(&self, _edges: &EdgeSet, _sources: &[NodeId], _sinks: &[NodeId]) -> Option<Vec<Edge>> {
            None
        }
    }

    /// Same `u - a - b - v` chain as the split tests. A two-edge cut on
    /// `(u, a)` and `(b, v)` separates `u` and `v` into singletons while
    /// leaving `a` and `b` joined -- the literal multi-edge cut §4.H
    /// describes, which used to be rejected outright on undo/redo.
    #[test]
    fn multicut_applies_multi_edge_cut_and_stamps_bbox() {
        let layout = GraphLayout::for_test();
        let store = new_store();

        let u = supervoxel(&layout, 1);
        let a = supervoxel(&layout, 2);
        let b = supervoxel(&layout, 3);
        let v = supervoxel(&layout, 4);
        write_chain(&store, &layout, &[u, a, b, v]);

        let chunk_edges = EdgeSet::from_edges(vec![
            Edge::new(u, a, Some(1.0), None),
            Edge::new(a, b, Some(1.0), None),
            Edge::new(b, v, Some(1.0), None),
        ]);
        let editor = Editor::new(store, layout).with_chunk_edge_store(Arc::new(FixedChunkEdges(chunk_edges)));

        let solver = Arc::new(FixedCutSolver(vec![Edge::new(u, a, None, None), Edge::new(b, v, None, None)]));
        let outcome = editor
            .multicut(
                MulticutRequest {
                    sources: vec![u],
                    sinks: vec![v],
                    bbox_offset: [1, 1, 1],
                    user: "tester".into(),
                    client_timestamp_ms: 0,
                },
                solver,
            )
            .unwrap();

        assert_eq!(outcome.new_roots.len(), 3);

        let entry = editor.read().operation_log_entry(outcome.op_id).unwrap().unwrap();
        assert_eq!(entry.kind, OperationKind::Multicut);
        assert_eq!(entry.bbox_offset, Some([1, 1, 1]));
        assert_eq!(entry.removed_edges.len(), 2);
    }

    #[test]
    fn multicut_surfaces_precondition_error_when_no_cut_exists() {
        let layout = GraphLayout::for_test();
        let store = new_store();
        let u = supervoxel(&layout, 1);
        let v = supervoxel(&layout, 2);
        write_chain(&store, &layout, &[u, v]);

        let chunk_edges = EdgeSet::from_edges(vec![Edge::new(u, v, Some(1.0), None)]);
        let editor = Editor::new(store, layout).with_chunk_edge_store(Arc::new(FixedChunkEdges(chunk_edges)));

        let err = editor
            .multicut(
                MulticutRequest {
                    sources: vec![u],
                    sinks: vec![v],
                    bbox_offset: [0, 0, 0],
                    user: "tester".into(),
                    client_timestamp_ms: 0,
                },
                Arc::new(NoCutSolver),
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::PreconditionError(_)));
    }
}
