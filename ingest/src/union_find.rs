//! Minimal union-find over `NodeId`, shared by the leaf and parent build
//! steps for grouping connected components during ingest.

use std::collections::HashMap;

use chunkedgraph_id::NodeId;

pub struct UnionFind {
    parent: HashMap<NodeId, NodeId>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self { parent: HashMap::new() }
    }

    pub fn find(&mut self, x: NodeId) -> NodeId {
        let p = *self.parent.entry(x).or_insert(x);
        if p == x {
            return x;
        }
        let root = self.find(p);
        self.parent.insert(x, root);
        root
    }

    pub fn union(&mut self, a: NodeId, b: NodeId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}
