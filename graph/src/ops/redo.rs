use chunkedgraph_id::NodeId;

use crate::edges::Edge;
use crate::error::{GraphError, GraphResult};
use crate::oplog::OperationKind;

use super::{EditOutcome, Editor};

/// Redo a previously undone operation by re-applying its original edit
/// (§4.H Redo): a merge is replayed as a merge of every edge it added, a
/// split/multicut as a split of the same edges.
#[derive(Debug, Clone)]
pub struct RedoRequest {
    pub op_id: u64,
    pub user: String,
    pub client_timestamp_ms: u64,
}

impl Editor {
    pub fn redo(&self, req: RedoRequest) -> GraphResult<EditOutcome> {
        let entry = self
            .read()
            .operation_log_entry(req.op_id)?
            .ok_or_else(|| GraphError::NotFound(NodeId::from_raw(req.op_id)))?;

        match entry.kind {
            OperationKind::Merge => {
                if entry.added_edges.is_empty() {
                    return Err(GraphError::PreconditionError("merge entry has no added edge".into()));
                }
                let edges = entry.added_edges.iter().map(|(a, b)| Edge::new(*a, *b, None, None)).collect();
                self.merge_edges(edges, req.user, req.client_timestamp_ms)
            }
            OperationKind::Split | OperationKind::Multicut => self.split_edges(
                entry.removed_edges.clone(),
                entry.kind,
                req.user,
                req.client_timestamp_ms,
                None,
                entry.bbox_offset,
            ),
            OperationKind::Undo | OperationKind::Redo => Err(GraphError::PreconditionError(
                "cannot redo an undo/redo entry directly".into(),
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
    use crate::{Editor, MergeRequest, MulticutRequest, UndoRequest};

    #[test]
    fn redo_after_undo_of_merge_remerges() {
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
        let undone = editor.undo(UndoRequest { op_id: merged.op_id, user: "t".into(), client_timestamp_ms: 1 }).unwrap();
        assert_eq!(undone.new_roots.len(), 2);

        let redone = editor.redo(RedoRequest { op_id: merged.op_id, user: "t".into(), client_timestamp_ms: 2 }).unwrap();
        assert_eq!(redone.new_roots.len(), 1);
    }

    /// Redo of a multicut that removed two edges at once must re-cut both,
    /// not just the first -- the same multi-edge restriction fix #7 lifted
    /// from undo also applied to redo's Split/Multicut branch.
    #[test]
    fn redo_after_undo_of_multi_edge_multicut_recuts_both_edges() {
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

        let redone = editor.redo(RedoRequest { op_id: cut.op_id, user: "t".into(), client_timestamp_ms: 2 }).unwrap();
        assert_eq!(redone.new_roots.len(), 3);

        let entry = editor.read().operation_log_entry(redone.op_id).unwrap().unwrap();
        assert_eq!(entry.kind, OperationKind::Multicut);
        assert_eq!(entry.bbox_offset, Some([1, 1, 1]));
    }
}
