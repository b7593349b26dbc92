use std::collections::HashMap;

use chunkedgraph_id::NodeId;

use crate::error::GraphResult;
use crate::read::HierarchyReadService;

/// What an edit operation knows about one node before it has committed
/// anything. `None` means "not yet looked up"; `Some(None)` is a valid
/// answer too (e.g. a node with no parent yet).
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    parent: Option<Option<NodeId>>,
    children: Option<Vec<NodeId>>,
    /// Atomic edges incident to this supervoxel: `(partner, affinity,
    /// area)`, staged the same way as `parent`/`children` so a merge/split
    /// that touches the same supervoxel's adjacency twice in one operation
    /// sees its own uncommitted edit.
    atomic_cross_edges: Option<Vec<(NodeId, Option<f32>, Option<u32>)>>,
    is_new: bool,
}

/// Per-operation scratchpad sitting in front of the [`HierarchyReadService`],
/// per §4.F: edit operations stage every parent/children change here and
/// only ever read through it, so a multi-step operation sees its own
/// uncommitted writes without a round trip to storage, and the real
/// mutation batch is assembled from this cache's final contents at commit
/// time.
///
/// Nothing here is durable. An operation that aborts simply drops its
/// `EditCache`.
pub struct EditCache<'a> {
    read: &'a HierarchyReadService,
    entries: HashMap<NodeId, CacheEntry>,
    at: Option<chunkedgraph_store::Timestamp>,
}

impl<'a> EditCache<'a> {
    pub fn new(read: &'a HierarchyReadService, at: Option<chunkedgraph_store::Timestamp>) -> Self {
        Self { read, entries: HashMap::new(), at }
    }

    pub fn parent(&mut self, id: NodeId) -> GraphResult<Option<NodeId>> {
        if let Some(entry) = self.entries.get(&id) {
            if let Some(p) = entry.parent {
                return Ok(p);
            }
        }
        let p = self.read.parent(id, self.at)?;
        self.entries.entry(id).or_default().parent = Some(p);
        Ok(p)
    }

    pub fn children(&mut self, id: NodeId) -> GraphResult<Vec<NodeId>> {
        if let Some(entry) = self.entries.get(&id) {
            if let Some(c) = &entry.children {
                return Ok(c.clone());
            }
        }
        let c = self.read.children(id)?;
        self.entries.entry(id).or_default().children = Some(c.clone());
        Ok(c)
    }

    /// Stage a parent assignment. Does not touch storage.
    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.entries.entry(id).or_default().parent = Some(Some(parent));
    }

    /// Stage a children assignment. Does not touch storage.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.entries.entry(id).or_default().children = Some(children);
    }

    /// Register a node created by this operation (no prior storage state to
    /// fall through to).
    pub fn new_node(&mut self, id: NodeId, children: Vec<NodeId>) {
        self.entries.insert(id, CacheEntry { parent: Some(None), children: Some(children), is_new: true });
    }

    pub fn is_new(&self, id: NodeId) -> bool {
        self.entries.get(&id).map(|e| e.is_new).unwrap_or(false)
    }

    /// Every node this operation touched, for assembling the final
    /// `HierarchyParent`/`HierarchyChildren` mutation batch.
    pub fn touched(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }

    pub fn staged_children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.entries.get(&id).and_then(|e| e.children.as_deref())
    }

    pub fn staged_parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries.get(&id).and_then(|e| e.parent).flatten()
    }

    /// A supervoxel's atomic adjacency, falling through to storage on first
    /// touch and reflecting any delta staged since by `set_atomic_partners`.
    pub fn atomic_partners(&mut self, id: NodeId) -> GraphResult<Vec<(NodeId, Option<f32>, Option<u32>)>> {
        if let Some(entry) = self.entries.get(&id) {
            if let Some(p) = &entry.atomic_cross_edges {
                return Ok(p.clone());
            }
        }
        let p = self.read.atomic_partners(id, self.at)?;
        self.entries.entry(id).or_default().atomic_cross_edges = Some(p.clone());
        Ok(p)
    }

    /// Stage a supervoxel's updated atomic adjacency. Does not touch storage.
    pub fn set_atomic_partners(&mut self, id: NodeId, partners: Vec<(NodeId, Option<f32>, Option<u32>)>) {
        self.entries.entry(id).or_default().atomic_cross_edges = Some(partners);
    }

    pub fn staged_atomic_partners(&self, id: NodeId) -> Option<&[(NodeId, Option<f32>, Option<u32>)]> {
        self.entries.get(&id).and_then(|e| e.atomic_cross_edges.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunkedgraph_id::GraphLayout;
    use chunkedgraph_store::MemAdapter;

    use super::*;

    #[test]
    fn falls_through_to_storage_until_staged() {
        let layout = GraphLayout::for_test();
        let store: Arc<dyn chunkedgraph_store::StorageAdapter> = Arc::new(MemAdapter::new());
        let read = HierarchyReadService::new(store, layout);
        let mut cache = EditCache::new(&read, None);

        let id = NodeId::encode(&layout, 2, 0, 0, 0, 1).unwrap();
        assert_eq!(cache.parent(id).unwrap(), None);

        let parent = NodeId::encode(&layout, 3, 0, 0, 0, 1).unwrap();
        cache.set_parent(id, parent);
        assert_eq!(cache.parent(id).unwrap(), Some(parent));
    }

    #[test]
    fn atomic_partners_falls_through_then_stages() {
        let layout = GraphLayout::for_test();
        let store: Arc<dyn chunkedgraph_store::StorageAdapter> = Arc::new(MemAdapter::new());
        let read = HierarchyReadService::new(store, layout);
        let mut cache = EditCache::new(&read, None);

        let sv = NodeId::encode(&layout, 1, 0, 0, 0, 1).unwrap();
        assert!(cache.atomic_partners(sv).unwrap().is_empty());

        let partner = NodeId::encode(&layout, 1, 0, 0, 0, 2).unwrap();
        cache.set_atomic_partners(sv, vec![(partner, Some(0.9), Some(5))]);
        assert_eq!(cache.atomic_partners(sv).unwrap(), vec![(partner, Some(0.9), Some(5))]);
    }

    #[test]
    fn new_node_never_falls_through() {
        let layout = GraphLayout::for_test();
        let store: Arc<dyn chunkedgraph_store::StorageAdapter> = Arc::new(MemAdapter::new());
        let read = HierarchyReadService::new(store, layout);
        let mut cache = EditCache::new(&read, None);

        let child = NodeId::encode(&layout, 1, 0, 0, 0, 1).unwrap();
        let id = NodeId::encode(&layout, 2, 0, 0, 0, 9).unwrap();
        cache.new_node(id, vec![child]);
        assert!(cache.is_new(id));
        assert_eq!(cache.children(id).unwrap(), vec![child]);
    }
}
