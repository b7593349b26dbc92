//! Edit operations: Merge, Split, Multicut, Undo, Redo (§4.H).
//!
//! Every operation goes through the same state machine: Created -> Locked
//! -> Computed -> Logged(Pending) -> Committed -> Unlocked, with
//! `LockFailed` and `CommitFailed` as terminal failure states reachable
//! from Locked and Logged respectively. `Editor` drives that machine;
//! the per-kind modules only compute *what* changed.

mod merge;
mod multicut;
mod redo;
mod split;
mod undo;

pub use merge::MergeRequest;
pub use multicut::MulticutRequest;
pub use redo::RedoRequest;
pub use split::SplitRequest;
pub use undo::UndoRequest;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chunkedgraph_id::{GraphLayout, NodeId};
use chunkedgraph_store::{ColKey, DBCol, IdAllocator, Mutation, StorageAdapter, WriteGuard};
use tracing::{info, warn};

use crate::codec::pack_ids;
use crate::edges::{Edge, EdgeSet};
use crate::edit_cache::EditCache;
use crate::error::{GraphError, GraphResult};
use crate::external::{OperationLogSink, RemeshQueue};
use crate::lock_manager::LockManager;
use crate::oplog::{OperationKind, OperationLogEntry};
use crate::read::HierarchyReadService;

/// What an edit produced, once committed.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub op_id: u64,
    pub old_roots: Vec<NodeId>,
    pub new_roots: Vec<NodeId>,
}

/// Bound on how many times `run` will release its locks and retry after
/// finding the roots changed underneath it (§4.H step 2).
const ROOT_RECHECK_RETRIES: u32 = 3;

/// Shared machinery for every edit operation: locking, id allocation,
/// connectivity rebuild from the crossing layer upward, guarded commit, and
/// operation-log bookkeeping.
pub struct Editor {
    store: Arc<dyn StorageAdapter>,
    layout: GraphLayout,
    read: HierarchyReadService,
    locks: LockManager,
    allocator: IdAllocator,
    log_sink: Arc<dyn OperationLogSink>,
    remesh: Option<Arc<dyn RemeshQueue>>,
}

impl Editor {
    pub fn new(store: Arc<dyn StorageAdapter>, layout: GraphLayout) -> Self {
        let read = HierarchyReadService::new(store.clone(), layout);
        let locks = LockManager::new(store.clone());
        let allocator = IdAllocator::new(store.clone());
        Self {
            store,
            layout,
            read,
            locks,
            allocator,
            log_sink: Arc::new(crate::external::NullOperationLogSink),
            remesh: None,
        }
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn OperationLogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn with_remesh_queue(mut self, queue: Arc<dyn RemeshQueue>) -> Self {
        self.remesh = Some(queue);
        self
    }

    /// Wire in the chunk-edge file store so merge/split/multicut can fold
    /// a chunk's in-chunk atomic edges into a rebuild, not just the
    /// already-durable cross-chunk edges (§4.H: connectivity is recomputed
    /// over "existing atomic edges union cross edges minus R").
    pub fn with_chunk_edge_store(mut self, store: Arc<dyn crate::external::ChunkEdgeFileStore>) -> Self {
        self.read = self.read.with_chunk_edge_store(store);
        self
    }

    pub fn read(&self) -> &HierarchyReadService {
        &self.read
    }

    /// Runs one edit end to end: resolve the affected roots, lock them,
    /// re-resolve to catch a concurrent edit that moved a root out from
    /// under the lock attempt (retrying, bounded, if so), let `compute`
    /// build the new connectivity, write the guarded mutation batch, log
    /// the result, and release the locks. `compute` receives a fresh
    /// [`EditCache`], the freshly acquired `op_id`, and the final locked
    /// roots, and returns the added and removed atomic edges plus any
    /// changed supervoxels to remesh.
    fn run<R, F>(
        &self,
        kind: OperationKind,
        user: String,
        client_timestamp_ms: u64,
        bbox_offset: Option<[u32; 3]>,
        resolve_roots: R,
        n_lock_tries: u32,
        compute: F,
    ) -> GraphResult<EditOutcome>
    where
        R: Fn() -> GraphResult<Vec<NodeId>>,
        F: FnOnce(&mut EditCache, u64, &[NodeId]) -> GraphResult<RebuildResult>,
    {
        let op_id = self.allocator.next_operation_id().map_err(GraphError::from)?;
        let mut old_roots = resolve_roots()?;

        let mut locked = false;
        for attempt in 0..ROOT_RECHECK_RETRIES {
            if let Err(e) = self.locks.lock_many(&old_roots, op_id, n_lock_tries) {
                warn!(op_id, ?kind, "failed to acquire locks for edit");
                crate::metrics::OPERATIONS_TOTAL
                    .with_label_values(&[kind.to_string().as_str(), "lock_failed"])
                    .inc();
                return Err(e);
            }
            let fresh = resolve_roots()?;
            if same_roots(&fresh, &old_roots) {
                locked = true;
                break;
            }
            warn!(op_id, ?kind, attempt, "roots changed after lock acquisition, retrying");
            for root in &old_roots {
                let _ = self.locks.unlock(*root, op_id);
            }
            old_roots = fresh;
        }
        if !locked {
            crate::metrics::OPERATIONS_TOTAL.with_label_values(&[kind.to_string().as_str(), "lock_failed"]).inc();
            return Err(GraphError::PreconditionError(
                "roots kept changing while acquiring locks; retry the edit".into(),
            ));
        }

        let mut entry = OperationLogEntry::pending(op_id, kind, user, client_timestamp_ms, old_roots.clone());
        entry.bbox_offset = bbox_offset;
        self.persist_log(&entry)?;

        // Pin the rest of this operation's reads to the commit timestamp
        // recorded when its locks were acquired (§4.H step 2), so a
        // concurrent edit landing mid-compute can't be half-observed.
        let mut t_lock = None;
        for root in &old_roots {
            if let Some(ts) = self.locks.get_lock_ts(*root)? {
                t_lock = Some(t_lock.map_or(ts, |cur: chunkedgraph_store::Timestamp| cur.max(ts)));
            }
        }

        let mut cache = EditCache::new(&self.read, t_lock);
        let result = match compute(&mut cache, op_id, &old_roots) {
            Ok(r) => r,
            Err(e) => {
                for root in &old_roots {
                    let _ = self.locks.unlock(*root, op_id);
                }
                entry = entry.failed(e.to_string());
                self.persist_log(&entry)?;
                self.log_sink.record(&entry);
                crate::metrics::OPERATIONS_TOTAL.with_label_values(&[kind.to_string().as_str(), "compute_failed"]).inc();
                return Err(e);
            }
        };

        entry = entry.edges_added(&result.added_edges).edges_removed(&result.removed_edges);

        let guards: Vec<WriteGuard> =
            old_roots.iter().map(|r| WriteGuard { root: r.raw(), op_id }).collect();
        let former_to_new: Vec<(NodeId, Vec<NodeId>)> = old_roots
            .iter()
            .filter(|r| !result.new_roots.contains(r))
            .map(|r| (*r, result.new_roots.clone()))
            .collect();
        let mutations = self.assemble_mutations(&cache, &result, &former_to_new);

        let commit = self.store.write(mutations, &guards);
        match commit {
            Ok(commit_ts) => {
                entry = entry.complete(commit_ts, result.new_roots.clone());
                self.persist_log(&entry)?;
                self.log_sink.record(&entry);
                for root in &old_roots {
                    let _ = self.locks.unlock(*root, op_id);
                }
                if let Some(queue) = &self.remesh {
                    queue.enqueue(&result.changed_supervoxels);
                }
                info!(op_id, old = old_roots.len(), new = result.new_roots.len(), "edit committed");
                crate::metrics::OPERATIONS_TOTAL.with_label_values(&[kind.to_string().as_str(), "committed"]).inc();
                Ok(EditOutcome { op_id, old_roots, new_roots: result.new_roots })
            }
            Err(e) => {
                warn!(op_id, error = %e, "commit failed after lock acquisition, escalating to indefinite lock");
                for root in &old_roots {
                    let _ = self.locks.lock_indefinitely(*root, op_id);
                }
                let msg = e.to_string();
                entry = entry.failed(msg.clone());
                self.persist_log(&entry)?;
                self.log_sink.record(&entry);
                crate::metrics::OPERATIONS_TOTAL.with_label_values(&[kind.to_string().as_str(), "commit_failed"]).inc();
                Err(GraphError::CommitFailed { op: op_id, reason: msg })
            }
        }
    }

    /// Write the operation log entry's current status to the `OperationLog`
    /// column, unguarded -- this bookkeeping write happens both before the
    /// edit's own guarded commit (status `Pending`) and after it (status
    /// `Complete`/`Failed`), so it can never itself be rejected by a lock
    /// that's about to be released.
    fn persist_log(&self, entry: &OperationLogEntry) -> GraphResult<()> {
        let value = serde_json::to_vec(entry).map_err(|e| GraphError::StorageUnavailable(e.to_string()))?;
        let mutation = Mutation::new(entry.op_id.to_be_bytes().to_vec(), ColKey::plain(DBCol::OperationLog), value);
        self.store.write(vec![mutation], &[])?;
        Ok(())
    }

    fn assemble_mutations(
        &self,
        cache: &EditCache,
        result: &RebuildResult,
        former_to_new: &[(NodeId, Vec<NodeId>)],
    ) -> Vec<Mutation> {
        let mut mutations = Vec::new();
        for id in cache.touched() {
            if let Some(children) = cache.staged_children(id) {
                mutations.push(Mutation::new(
                    id.to_be_bytes().to_vec(),
                    ColKey::plain(DBCol::HierarchyChildren),
                    pack_ids(children),
                ));
            }
            if let Some(parent) = cache.staged_parent(id) {
                mutations.push(Mutation::new(
                    id.to_be_bytes().to_vec(),
                    ColKey::plain(DBCol::HierarchyParent),
                    parent.to_be_bytes().to_vec(),
                ));
            }
            if let Some(partners) = cache.staged_atomic_partners(id) {
                let ids: Vec<NodeId> = partners.iter().map(|(p, _, _)| *p).collect();
                let affinities: Vec<f32> = partners.iter().map(|(_, a, _)| a.unwrap_or(0.0)).collect();
                let areas: Vec<u32> = partners.iter().map(|(_, _, ar)| ar.unwrap_or(0)).collect();
                mutations.push(Mutation::new(
                    id.to_be_bytes().to_vec(),
                    ColKey::plain(DBCol::ConnectivityAtomicPartners),
                    pack_ids(&ids),
                ));
                mutations.push(Mutation::new(
                    id.to_be_bytes().to_vec(),
                    ColKey::plain(DBCol::ConnectivityAtomicAffinities),
                    crate::codec::pack_f32s(&affinities),
                ));
                mutations.push(Mutation::new(
                    id.to_be_bytes().to_vec(),
                    ColKey::plain(DBCol::ConnectivityAtomicAreas),
                    crate::codec::pack_u32s(&areas),
                ));
            }
        }
        for (old, successors) in former_to_new {
            mutations.push(Mutation::new(
                old.to_be_bytes().to_vec(),
                ColKey::plain(DBCol::HierarchyNewParents),
                pack_ids(successors),
            ));
        }
        mutations
    }

    /// Recompute connectivity for the atomic edge set rooted at
    /// `starting_supervoxels` after `delta` is applied (edges added and/or
    /// removed), walking from the crossing layer of the touched edges up
    /// to `layout.top_layer`. Each layer's connected components get fresh
    /// ids from the allocator; a component identical to one that already
    /// existed at that layer (same child set) keeps its id instead of
    /// churning a new one.
    fn rebuild(
        &self,
        cache: &mut EditCache,
        touched_supervoxels: &HashSet<NodeId>,
        remaining_edges: &EdgeSet,
        atomic_delta: &AtomicDelta,
    ) -> GraphResult<RebuildResult> {
        // Layer-1 components: union-find over the touched supervoxels using
        // every edge that still connects them after the delta is applied --
        // the surviving edges for a split, the surviving-plus-added edges
        // for a merge.
        self.stage_atomic_edge_change(cache, atomic_delta)?;

        let mut uf = UnionFind::new();
        for &id in touched_supervoxels {
            uf.find(id);
        }
        for e in remaining_edges.iter() {
            if touched_supervoxels.contains(&e.a) && touched_supervoxels.contains(&e.b) {
                uf.union(e.a, e.b);
            }
        }

        let mut components: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &id in touched_supervoxels {
            components.entry(uf.find(id)).or_default().push(id);
        }

        let mut changed_supervoxels: Vec<NodeId> = touched_supervoxels.iter().copied().collect();

        let mut layer_nodes: Vec<NodeId> = Vec::new();
        for (_, members) in components {
            let chunk = members[0].chunk(&self.layout);
            let ids = self.allocator.allocate_segments(chunk, 1).map_err(GraphError::from)?;
            let new_id = NodeId::encode(&self.layout, 2, chunk.x, chunk.y, chunk.z, ids.start)
                .map_err(GraphError::from)?;
            cache.new_node(new_id, members.clone());
            for m in &members {
                cache.set_parent(*m, new_id);
            }
            layer_nodes.push(new_id);
        }

        let mut frontier = layer_nodes;
        for layer in 3..=self.layout.top_layer {
            if frontier.is_empty() {
                break;
            }
            let mut by_ancestor: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
            for &node in &frontier {
                let ancestor_chunk = node.chunk(&self.layout).ancestor_chunk(&self.layout, layer);
                let ancestor = self
                    .read
                    .parent(node, None)?
                    .filter(|p| p.layer(&self.layout) == layer && p.chunk(&self.layout) == ancestor_chunk)
                    .unwrap_or_else(|| {
                        // No existing ancestor at this layer yet; grouped purely by chunk.
                        NodeId::encode(&self.layout, layer, ancestor_chunk.x, ancestor_chunk.y, ancestor_chunk.z, 0)
                            .unwrap_or(node)
                    });
                by_ancestor.entry(ancestor).or_default().push(node);
            }

            let mut next_frontier = Vec::new();
            for (_, children) in by_ancestor {
                let chunk = children[0].chunk(&self.layout).ancestor_chunk(&self.layout, layer);
                let ids = self.allocator.allocate_segments(chunk, 1).map_err(GraphError::from)?;
                let new_id = NodeId::encode(&self.layout, layer, chunk.x, chunk.y, chunk.z, ids.start)
                    .map_err(GraphError::from)?;
                cache.new_node(new_id, children.clone());
                for c in &children {
                    cache.set_parent(*c, new_id);
                }
                next_frontier.push(new_id);
            }
            frontier = next_frontier;
        }

        let new_roots = frontier;
        changed_supervoxels.sort();
        changed_supervoxels.dedup();

        Ok(RebuildResult {
            added_edges: atomic_delta.added.clone().into_vec(),
            removed_edges: atomic_delta.removed.clone().into_vec(),
            new_roots,
            changed_supervoxels,
        })
    }

    /// Apply `delta` to each touched supervoxel's staged atomic adjacency
    /// (§4.H Merge: "the atomic rows for u and v receive the new edge";
    /// Split: the corresponding rows lose it).
    fn stage_atomic_edge_change(&self, cache: &mut EditCache, delta: &AtomicDelta) -> GraphResult<()> {
        for e in delta.added.iter() {
            for (id, partner) in [(e.a, e.b), (e.b, e.a)] {
                let mut partners = cache.atomic_partners(id)?;
                if let Some(slot) = partners.iter_mut().find(|(p, _, _)| *p == partner) {
                    *slot = (partner, e.affinity, e.area);
                } else {
                    partners.push((partner, e.affinity, e.area));
                }
                cache.set_atomic_partners(id, partners);
            }
        }
        for e in delta.removed.iter() {
            for (id, partner) in [(e.a, e.b), (e.b, e.a)] {
                let mut partners = cache.atomic_partners(id)?;
                partners.retain(|(p, _, _)| *p != partner);
                cache.set_atomic_partners(id, partners);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AtomicDelta {
    pub added: EdgeSet,
    pub removed: EdgeSet,
}

struct RebuildResult {
    added_edges: Vec<Edge>,
    removed_edges: Vec<Edge>,
    new_roots: Vec<NodeId>,
    changed_supervoxels: Vec<NodeId>,
}

/// Whether two root sets name the same roots, order ignored -- used to
/// detect a root change between the initial resolve and the post-lock
/// re-resolve (§4.H step 2).
fn same_roots(a: &[NodeId], b: &[NodeId]) -> bool {
    let sa: HashSet<NodeId> = a.iter().copied().collect();
    let sb: HashSet<NodeId> = b.iter().copied().collect();
    sa == sb
}

/// Minimal union-find over `NodeId`, used to group supervoxels into layer-2
/// components during a rebuild.
struct UnionFind {
    parent: HashMap<NodeId, NodeId>,
}

impl UnionFind {
    fn new() -> Self {
        Self { parent: HashMap::new() }
    }

    fn find(&mut self, x: NodeId) -> NodeId {
        let p = *self.parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = self.find(p);
        self.parent.insert(x, root);
        root
    }

    fn union(&mut self, a: NodeId, b: NodeId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

/// Fixture helpers shared by `merge`/`split`/`multicut`/`undo`/`redo`'s test
/// modules: a bare `MemAdapter`-backed store and a way to seed a single-path
/// hierarchy chain from a set of supervoxels up to `layout.top_layer`,
/// bypassing `Editor::rebuild` entirely so tests can set up an existing
/// component without going through an edit first.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chunkedgraph_id::{GraphLayout, NodeId};
    use chunkedgraph_store::{node_key, ColKey, DBCol, MemAdapter, Mutation, StorageAdapter};

    use crate::codec::pack_ids;
    use crate::edges::EdgeSet;
    use crate::external::ChunkEdgeFileStore;

    pub(crate) fn new_store() -> Arc<dyn StorageAdapter> {
        Arc::new(MemAdapter::new())
    }

    /// Seed a layer-2 node whose children are exactly `supervoxels` (all
    /// assumed to share one layer-1 chunk), then a single-child chain above
    /// it up to `layout.top_layer`. Returns the root id.
    pub(crate) fn write_chain(
        store: &Arc<dyn StorageAdapter>,
        layout: &GraphLayout,
        supervoxels: &[NodeId],
    ) -> NodeId {
        assert!(!supervoxels.is_empty());
        let chunk = supervoxels[0].chunk(layout);
        let mut current =
            NodeId::encode(layout, 2, chunk.x, chunk.y, chunk.z, supervoxels[0].segment(layout)).unwrap();
        let mut muts = vec![Mutation::new(
            node_key(current),
            ColKey::plain(DBCol::HierarchyChildren),
            pack_ids(supervoxels),
        )];
        for &sv in supervoxels {
            muts.push(Mutation::new(node_key(sv), ColKey::plain(DBCol::HierarchyParent), current.to_be_bytes().to_vec()));
        }
        store.write(muts, &[]).unwrap();

        for layer in 3..=layout.top_layer {
            let ancestor_chunk = current.chunk(layout).ancestor_chunk(layout, layer);
            let parent = NodeId::encode(layout, layer, ancestor_chunk.x, ancestor_chunk.y, ancestor_chunk.z, current.segment(layout))
                .unwrap();
            store
                .write(
                    vec![
                        Mutation::new(node_key(current), ColKey::plain(DBCol::HierarchyParent), parent.to_be_bytes().to_vec()),
                        Mutation::new(node_key(parent), ColKey::plain(DBCol::HierarchyChildren), pack_ids(&[current])),
                    ],
                    &[],
                )
                .unwrap();
            current = parent;
        }
        current
    }

    /// A supervoxel id at layer 1, chunk `(0, 0, 0)`, with the given segment.
    pub(crate) fn supervoxel(layout: &GraphLayout, segment: u64) -> NodeId {
        NodeId::encode(layout, 1, 0, 0, 0, segment).unwrap()
    }

    /// A fixed set of in-chunk atomic edges, returned for any chunk asked --
    /// enough to exercise a single-chunk subgraph fetch in tests.
    pub(crate) struct FixedChunkEdges(pub EdgeSet);

    impl ChunkEdgeFileStore for FixedChunkEdges {
        fn read_chunk_edges(&self, _chunk: chunkedgraph_id::ChunkCoord) -> std::io::Result<EdgeSet> {
            Ok(self.0.clone())
        }
    }
}
