use std::collections::HashSet;

use chunkedgraph_id::NodeId;

use crate::edges::{Edge, EdgeSet};
use crate::error::{GraphError, GraphResult};
use crate::oplog::OperationKind;

use super::{AtomicDelta, EditOutcome, Editor};

/// A merge request: join the components containing `source` and `sink` by
/// adding one atomic edge between them (§4.H Merge).
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub source: NodeId,
    pub sink: NodeId,
    pub affinity: Option<f32>,
    pub user: String,
    pub client_timestamp_ms: u64,
}

impl Editor {
    pub fn merge(&self, req: MergeRequest) -> GraphResult<EditOutcome> {
        if req.source == req.sink {
            return Err(GraphError::PreconditionError(
                "merge source and sink must be distinct supervoxels".into(),
            ));
        }
        let edge = Edge::new(req.source, req.sink, req.affinity, None);
        self.merge_edges(vec![edge], req.user, req.client_timestamp_ms)
    }

    /// Merge along every edge in `edges` as a single operation -- the
    /// general form `merge` and Undo-of-Split/Multicut both build on.
    pub(crate) fn merge_edges(
        &self,
        edges: Vec<Edge>,
        user: String,
        client_timestamp_ms: u64,
    ) -> GraphResult<EditOutcome> {
        let top_layer = self.read().layout().top_layer;
        let resolve_roots = {
            let edges = edges.clone();
            move || -> GraphResult<Vec<NodeId>> {
                let mut roots = HashSet::new();
                for e in &edges {
                    roots.insert(self.read().root(e.a, top_layer, true, None, 8)?);
                    roots.insert(self.read().root(e.b, top_layer, true, None, 8)?);
                }
                Ok(roots.into_iter().collect())
            }
        };

        self.run(
            OperationKind::Merge,
            user,
            client_timestamp_ms,
            None,
            resolve_roots,
            8,
            move |cache, _op_id, roots| {
                let mut touched = HashSet::new();
                for e in &edges {
                    touched.insert(e.a);
                    touched.insert(e.b);
                }
                let mut remaining = EdgeSet::new();
                for e in &edges {
                    remaining.push(*e);
                }
                for root in roots {
                    let local = self.read().subgraph(&[*root], None, crate::read::SubgraphMode::Both)?;
                    for sv in local.supervoxels {
                        touched.insert(sv);
                    }
                    for e in local.edges.iter() {
                        remaining.push(*e);
                    }
                    let cross = self.read().cross_chunk_edges(&[*root], false)?;
                    for (_, ce) in cross {
                        for e in ce.iter() {
                            remaining.push(*e);
                        }
                    }
                }
                let delta = AtomicDelta { added: EdgeSet::from_edges(edges.clone()), removed: EdgeSet::new() };
                self.rebuild(cache, &touched, &remaining, &delta)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use chunkedgraph_id::GraphLayout;

    use super::super::test_support::{new_store, supervoxel, write_chain};
    use super::*;

    #[test]
    fn merge_joins_two_components_and_records_atomic_adjacency() {
        let layout = GraphLayout::for_test();
        let store = new_store();

        let a = supervoxel(&layout, 1);
        let b = supervoxel(&layout, 2);
        let root_a = write_chain(&store, &layout, &[a]);
        let root_b = write_chain(&store, &layout, &[b]);
        assert_ne!(root_a, root_b);

        let editor = Editor::new(store, layout);
        let outcome = editor
            .merge(MergeRequest {
                source: a,
                sink: b,
                affinity: Some(0.75),
                user: "tester".into(),
                client_timestamp_ms: 0,
            })
            .unwrap();

        assert_eq!(outcome.new_roots.len(), 1);
        assert_eq!(outcome.old_roots.len(), 2);

        let partners_a = editor.read().atomic_partners(a, None).unwrap();
        assert_eq!(partners_a, vec![(b, Some(0.75), None)]);
        let partners_b = editor.read().atomic_partners(b, None).unwrap();
        assert_eq!(partners_b, vec![(a, Some(0.75), None)]);

        let entry = editor.read().operation_log_entry(outcome.op_id).unwrap().unwrap();
        assert_eq!(entry.kind, OperationKind::Merge);
        assert_eq!(entry.added_edges, vec![(a.min(b), a.max(b))]);
        assert_eq!(entry.new_roots, outcome.new_roots);
    }

    #[test]
    fn merge_rejects_self_loop() {
        let layout = GraphLayout::for_test();
        let store = new_store();
        let a = supervoxel(&layout, 1);
        write_chain(&store, &layout, &[a]);
        let editor = Editor::new(store, layout);

        let err = editor
            .merge(MergeRequest { source: a, sink: a, affinity: None, user: "tester".into(), client_timestamp_ms: 0 })
            .unwrap_err();
        assert!(matches!(err, GraphError::PreconditionError(_)));
    }
}
