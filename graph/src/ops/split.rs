use std::collections::HashSet;

use chunkedgraph_id::NodeId;

use crate::edges::EdgeSet;
use crate::error::{GraphError, GraphResult};
use crate::oplog::OperationKind;
use crate::read::BBox;

use super::{AtomicDelta, EditOutcome, Editor};

/// A split request: remove a specific set of atomic edges, which may or may
/// not disconnect the containing component (§4.H Split). Multicut builds
/// its edge list from a min-cut solve and then applies it through the same
/// machinery, logged under its own operation kind with a bounding box.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub removed_edges: Vec<(NodeId, NodeId)>,
    pub user: String,
    pub client_timestamp_ms: u64,
}

impl Editor {
    pub fn split(&self, req: SplitRequest) -> GraphResult<EditOutcome> {
        if req.removed_edges.is_empty() {
            return Err(GraphError::PreconditionError("split requires at least one edge".into()));
        }
        self.split_edges(req.removed_edges, OperationKind::Split, req.user, req.client_timestamp_ms, None, None)
    }

    /// Shared machinery behind Split and Multicut: resolve the edges'
    /// shared root, recompute connectivity with `removed` tombstoned out of
    /// the local-plus-cross edge set, and commit under `kind`. `bbox`, when
    /// given, bounds the subgraph fetch to Multicut's requested region and
    /// `bbox_offset` is stamped onto the logged operation for it (§4.H).
    pub(crate) fn split_edges(
        &self,
        removed_edges: Vec<(NodeId, NodeId)>,
        kind: OperationKind,
        user: String,
        client_timestamp_ms: u64,
        bbox: Option<BBox>,
        bbox_offset: Option<[u32; 3]>,
    ) -> GraphResult<EditOutcome> {
        let mut endpoints = HashSet::new();
        for (a, b) in &removed_edges {
            endpoints.insert(*a);
            endpoints.insert(*b);
        }
        let top = self.read().layout().top_layer;
        let resolve_roots = {
            let endpoints: Vec<NodeId> = endpoints.iter().copied().collect();
            move || -> GraphResult<Vec<NodeId>> {
                let mut roots: Vec<NodeId> = Vec::new();
                for &id in &endpoints {
                    let root = self.read().root(id, top, true, None, 8)?;
                    if !roots.contains(&root) {
                        roots.push(root);
                    }
                }
                if roots.len() != 1 {
                    return Err(GraphError::PreconditionError(
                        "split edges must all belong to a single existing component".into(),
                    ));
                }
                Ok(roots)
            }
        };

        let removed = removed_edges;

        self.run(
            kind,
            user,
            client_timestamp_ms,
            bbox_offset,
            resolve_roots,
            8,
            move |cache, _op_id, roots| {
                let root = roots[0];
                let local = self.read().subgraph(&[root], bbox, crate::read::SubgraphMode::Both)?;
                let touched: HashSet<NodeId> = local.supervoxels.into_iter().collect();

                let mut remaining = EdgeSet::new();
                for e in local.edges.iter() {
                    if touched.contains(&e.a) && touched.contains(&e.b) {
                        remaining.push(*e);
                    }
                }
                let cross = self.read().cross_chunk_edges(&[root], false)?;
                for (_, edges) in cross {
                    for e in edges.iter() {
                        if touched.contains(&e.a) && touched.contains(&e.b) {
                            remaining.push(*e);
                        }
                    }
                }
                for (a, b) in &removed {
                    remaining = {
                        let mut tombstoned = EdgeSet::new();
                        for e in remaining.iter() {
                            if e.endpoints() != (*a, *b) && e.endpoints() != (*b, *a) {
                                tombstoned.push(*e);
                            }
                        }
                        tombstoned
                    };
                }

                let removed_set = EdgeSet::from_edges(
                    removed
                        .iter()
                        .map(|(a, b)| crate::edges::Edge::new(*a, *b, None, None))
                        .collect(),
                );
                let delta = AtomicDelta { added: EdgeSet::new(), removed: removed_set };
                self.rebuild(cache, &touched, &remaining, &delta)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunkedgraph_id::GraphLayout;

    use super::super::test_support::{new_store, supervoxel, write_chain, FixedChunkEdges};
    use super::*;
    use crate::edges::Edge;
    use crate::Editor;

    /// A chain `u - a - b - v`, all atomic edges within one layer-2 chunk.
    /// Splitting the middle edge `(a, b)` must separate `{u, a}` from `{b,
    /// v}` using only the in-chunk edges -- before the rebuild folded local
    /// chunk edges in, nothing connected these supervoxels at all and the
    /// split produced four singleton components instead of two.
    #[test]
    fn split_severs_chain_using_in_chunk_edges() {
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

        let outcome = editor
            .split(SplitRequest { removed_edges: vec![(a, b)], user: "tester".into(), client_timestamp_ms: 0 })
            .unwrap();

        assert_eq!(outcome.old_roots.len(), 1);
        assert_eq!(outcome.new_roots.len(), 2);

        let entry = editor.read().operation_log_entry(outcome.op_id).unwrap().unwrap();
        assert_eq!(entry.kind, OperationKind::Split);
        assert_eq!(entry.removed_edges, vec![(a, b)]);
    }

    #[test]
    fn split_rejects_empty_edge_list() {
        let layout = GraphLayout::for_test();
        let store = new_store();
        let editor = Editor::new(store, layout);
        let err = editor
            .split(SplitRequest { removed_edges: vec![], user: "tester".into(), client_timestamp_ms: 0 })
            .unwrap_err();
        assert!(matches!(err, GraphError::PreconditionError(_)));
    }
}
