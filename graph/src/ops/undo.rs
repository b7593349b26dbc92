use chunkedgraph_id::NodeId;

use crate::edges::Edge;
use crate::error::{GraphError, GraphResult};
use crate::oplog::OperationKind;

use super::{EditOutcome, Editor, SplitRequest};

/// Undo a completed operation by applying its inverse: every edge a merge
/// added is split back out, every edge a split or multicut removed is
/// re-merged, as one operation each (§4.H Undo).
#[derive(Debug, Clone)]
pub struct UndoRequest {
    pub op_id: u64,
    pub user: String,
    pub client_timestamp_ms: u64,
}

impl Editor {
    pub fn undo(&self, req: UndoRequest) -> GraphResult<EditOutcome> {
        let entry = self
            .read()
            .operation_log_entry(req.op_id)?
            .ok_or_else(|| GraphError::NotFound(NodeId::from_raw(req.op_id)))?;

        match entry.kind {
            OperationKind::Merge => {
                if entry.added_edges.is_empty() {
                    return Err(GraphError::PreconditionError("merge entry has no added edge".into()));
                }
                self.split(SplitRequest {
                    removed_edges: entry.added_edges.clone(),
                    user: req.user,
                    client_timestamp_ms: req.client_timestamp_ms,
                })
            }
            OperationKind::Split | OperationKind::Multicut => {
                if entry.removed_edges.is_empty() {
                    return Err(GraphError::PreconditionError("split/multicut entry has no removed edge".into()));
                }
                let edges = entry.removed_edges.iter().map(|(a, b)| Edge::new(*a, *b, None, None)).collect();
                self.merge_edges(edges, req.user, req.client_timestamp_ms)
            }
            OperationKind::Undo | OperationKind::Redo => Err(GraphError::PreconditionError(
                "cannot undo an undo/redo entry directly; use redo".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunkedgraph_id::GraphLayout;

    use super::super::test_support::{new_store, supervoxel, write_chain, FixedChunkEdges};
    use super::*;
    use crate::edges::EdgeSet;
    use crate::{Editor, MergeRequest, MulticutRequest};

    #[test]
    fn undo_of_merge_splits_the_added_edge_back_out() {
        let layout = GraphLayout::for_test();
        let store = new_store();
        let a = supervoxel(&layout, 1);
        let b = supervoxel(&layout, 2);
        write_chain(&store, &layout, &[a]);
        write_chain(&store, &layout, &[b]);
        let editor = Editor::new(store, layout);

        let merged = editor
            .merge(MergeRequest { source: a, sink: b, affinity: Some(0.5), user: "t".into(), client_timestamp_ms: 0 })
            .unwrap();
        assert_eq!(merged.new_roots.len(), 1);

        let undone = editor.undo(UndoRequest { op_id: merged.op_id, user: "t".into(), client_timestamp_ms: 1 }).unwrap();
        assert_eq!(undone.new_roots.len(), 2);
        assert_eq!(editor.read().atomic_partners(a, None).unwrap(), vec![]);
        assert_eq!(editor.read().atomic_partners(b, None).unwrap(), vec![]);
    }

    /// Undo of a multicut that removed two edges at once used to be rejected
    /// outright (only single-edge removals were allowed); both edges must be
    /// re-merged together as one operation, restoring the original chain.
    #[test]
    fn undo_of_multi_edge_multicut_remerges_both_edges() {
        let layout = GraphLayout::for_test();
        let store = new_store();
        let u = supervoxel(&layout, 1);
        let a = supervoxel(&layout, 2);
        let b = supervoxel(&layout, 3);
        let v = supervoxel(&layout, 4);
        write_chain(&store, &layout, &[u, a, b, v]);

        let chunk_edges = EdgeSet::from_edges(vec![
            crate::edges::Edge::new(u, a, Some(1.0), None),
            crate::edges::Edge::new(a, b, Some(1.0), None),
            crate::edges::Edge::new(b, v, Some(1.0), None),
        ]);
        let editor = Editor::new(store, layout).with_chunk_edge_store(Arc::new(FixedChunkEdges(chunk_edges)));

        struct FixedCut(Vec<crate::edges::Edge>);
        impl crate::external::MinCutSolver for FixedCut {
            fn min_cut(
                &self,
                _edges: &EdgeSet,
                _sources: &[NodeId],
                _sinks: &[NodeId],
            ) -> Option<Vec<crate::edges::Edge>> {
                Some(self.0.clone())
            }
        }
        let solver = Arc::new(FixedCut(vec![
            crate::edges::Edge::new(u, a, None, None),
            crate::edges::Edge::new(b, v, None, None),
        ]));

        let cut = editor
            .multicut(
                MulticutRequest {
                    sources: vec![u],
                    sinks: vec![v],
                    bbox_offset: [1, 1, 1],
                    user: "t".into(),
                    client_timestamp_ms: 0,
                },
                solver,
            )
            .unwrap();
        assert_eq!(cut.new_roots.len(), 3);

        let undone = editor.undo(UndoRequest { op_id: cut.op_id, user: "t".into(), client_timestamp_ms: 1 }).unwrap();
        assert_eq!(undone.new_roots.len(), 1);
    }
}
