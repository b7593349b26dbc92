use std::collections::HashSet;

use chunkedgraph_id::NodeId;

/// An atomic edge between two layer-1 ids, normalized so `a <= b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    pub affinity: Option<f32>,
    pub area: Option<u32>,
}

impl Edge {
    pub fn new(u: NodeId, v: NodeId, affinity: Option<f32>, area: Option<u32>) -> Self {
        let (a, b) = if u <= v { (u, v) } else { (v, u) };
        Self { a, b, affinity, area }
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.a, self.b)
    }

    pub fn other(&self, one: NodeId) -> Option<NodeId> {
        if one == self.a {
            Some(self.b)
        } else if one == self.b {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A columnar container of atomic edges: parallel arrays `(a, b, affinity,
/// area)` per §4.D, kept sorted by `(a, b)` so union/difference/intersect
/// run as a single merge pass rather than per-element hashing -- the "large
/// intermediate arrays of ids" guidance in §9.
#[derive(Debug, Clone, Default)]
pub struct EdgeSet {
    edges: Vec<Edge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    pub fn from_edges(mut edges: Vec<Edge>) -> Self {
        edges.sort_by_key(|e| (e.a, e.b));
        edges.dedup_by_key(|e| (e.a, e.b));
        Self { edges }
    }

    pub fn push(&mut self, edge: Edge) {
        match self.edges.binary_search_by_key(&(edge.a, edge.b), |e| (e.a, e.b)) {
            Ok(idx) => self.edges[idx] = edge,
            Err(idx) => self.edges.insert(idx, edge),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn contains(&self, u: NodeId, v: NodeId) -> bool {
        let (a, b) = if u <= v { (u, v) } else { (v, u) };
        self.edges.binary_search_by_key(&(a, b), |e| (e.a, e.b)).is_ok()
    }

    pub fn into_vec(self) -> Vec<Edge> {
        self.edges
    }

    /// Union, deduplicating on `(a, b)`; `other`'s value wins on conflict,
    /// matching last-write-wins semantics used when merging cross edges
    /// from two sides of a join.
    pub fn union(&self, other: &EdgeSet) -> EdgeSet {
        merge(self, other, |l, r| r.unwrap_or(l))
    }

    /// Set difference: edges in `self` whose `(a, b)` does not appear in
    /// `other`.
    pub fn difference(&self, other: &EdgeSet) -> EdgeSet {
        let mut out = Vec::with_capacity(self.edges.len());
        let (mut i, mut j) = (0, 0);
        while i < self.edges.len() {
            while j < other.edges.len() && key(&other.edges[j]) < key(&self.edges[i]) {
                j += 1;
            }
            if j >= other.edges.len() || key(&other.edges[j]) != key(&self.edges[i]) {
                out.push(self.edges[i]);
            }
            i += 1;
        }
        EdgeSet { edges: out }
    }

    pub fn intersect(&self, other: &EdgeSet) -> EdgeSet {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.edges.len() && j < other.edges.len() {
            match key(&self.edges[i]).cmp(&key(&other.edges[j])) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(self.edges[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        EdgeSet { edges: out }
    }

    /// Every distinct endpoint across all edges.
    pub fn endpoints(&self) -> HashSet<NodeId> {
        let mut out = HashSet::with_capacity(self.edges.len() * 2);
        for e in &self.edges {
            out.insert(e.a);
            out.insert(e.b);
        }
        out
    }
}

fn key(e: &Edge) -> (NodeId, NodeId) {
    (e.a, e.b)
}

fn merge(a: &EdgeSet, b: &EdgeSet, pick: impl Fn(Edge, Option<Edge>) -> Edge) -> EdgeSet {
    let mut out = Vec::with_capacity(a.edges.len() + b.edges.len());
    let (mut i, mut j) = (0, 0);
    while i < a.edges.len() && j < b.edges.len() {
        match key(&a.edges[i]).cmp(&key(&b.edges[j])) {
            std::cmp::Ordering::Less => {
                out.push(a.edges[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b.edges[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(pick(a.edges[i], Some(b.edges[j])));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend(a.edges[i..].iter().copied());
    out.extend(b.edges[j..].iter().copied());
    EdgeSet { edges: out }
}

/// The three-way partition an edge falls into relative to a supervoxel set
/// `S`, per §4.D: both endpoints in `S` ("in"), one endpoint in `S` and the
/// partner in the same chunk ("out"), or one endpoint in `S` and the
/// partner in a different chunk ("cross").
#[derive(Debug, Clone, Default)]
pub struct Categorized {
    pub in_set: EdgeSet,
    pub out_set: EdgeSet,
    pub cross_set: EdgeSet,
}

/// Vectorized categorization -- the authoritative path per the Open
/// Questions in §9: the source's per-id and vectorized categorizers must
/// agree, and the vectorized one is specified here as ground truth.
pub fn categorize(
    layout: &chunkedgraph_id::GraphLayout,
    supervoxels: &HashSet<NodeId>,
    edges: &EdgeSet,
) -> Categorized {
    let mut out = Categorized::default();
    for edge in edges.iter() {
        let a_in = supervoxels.contains(&edge.a);
        let b_in = supervoxels.contains(&edge.b);
        match (a_in, b_in) {
            (true, true) => out.in_set.push(*edge),
            (false, false) => {}
            _ => {
                let same_chunk = edge.a.chunk(layout) == edge.b.chunk(layout);
                if same_chunk {
                    out.out_set.push(*edge);
                } else {
                    out.cross_set.push(*edge);
                }
            }
        }
    }
    out
}

/// Per-id categorizer kept only as a cross-check in tests: must always
/// agree with [`categorize`].
#[cfg(test)]
pub(crate) fn categorize_per_id(
    layout: &chunkedgraph_id::GraphLayout,
    supervoxels: &HashSet<NodeId>,
    edges: &EdgeSet,
) -> Categorized {
    let mut out = Categorized::default();
    for edge in edges.iter() {
        for (id, other) in [(edge.a, edge.b), (edge.b, edge.a)] {
            if !supervoxels.contains(&id) {
                continue;
            }
            if supervoxels.contains(&other) {
                if id == edge.a {
                    out.in_set.push(*edge);
                }
                break;
            }
            let same_chunk = id.chunk(layout) == other.chunk(layout);
            if same_chunk {
                out.out_set.push(*edge);
            } else {
                out.cross_set.push(*edge);
            }
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedgraph_id::GraphLayout;

    fn id(layout: &GraphLayout, cx: u64, seg: u64) -> NodeId {
        NodeId::encode(layout, 1, cx, 0, 0, seg).unwrap()
    }

    #[test]
    fn union_dedups_and_prefers_right() {
        let layout = GraphLayout::for_test();
        let u = id(&layout, 0, 1);
        let v = id(&layout, 0, 2);
        let a = EdgeSet::from_edges(vec![Edge::new(u, v, Some(1.0), Some(10))]);
        let b = EdgeSet::from_edges(vec![Edge::new(u, v, Some(2.0), Some(20))]);
        let union = a.union(&b);
        assert_eq!(union.len(), 1);
        assert_eq!(union.iter().next().unwrap().affinity, Some(2.0));
    }

    #[test]
    fn difference_removes_shared_edges() {
        let layout = GraphLayout::for_test();
        let u = id(&layout, 0, 1);
        let v = id(&layout, 0, 2);
        let w = id(&layout, 0, 3);
        let a = EdgeSet::from_edges(vec![Edge::new(u, v, None, None), Edge::new(u, w, None, None)]);
        let b = EdgeSet::from_edges(vec![Edge::new(u, v, None, None)]);
        let diff = a.difference(&b);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.iter().next().unwrap().endpoints(), (u, w));
    }

    #[test]
    fn categorize_matches_per_id_categorizer() {
        let layout = GraphLayout::for_test();
        let in1 = id(&layout, 0, 1);
        let in2 = id(&layout, 0, 2);
        let out_partner = id(&layout, 0, 3);
        let cross_partner = id(&layout, 1, 4);
        let edges = EdgeSet::from_edges(vec![
            Edge::new(in1, in2, None, None),
            Edge::new(in1, out_partner, None, None),
            Edge::new(in2, cross_partner, None, None),
        ]);
        let mut set = HashSet::new();
        set.insert(in1);
        set.insert(in2);

        let vectorized = categorize(&layout, &set, &edges);
        let per_id = categorize_per_id(&layout, &set, &edges);
        assert_eq!(vectorized.in_set.len(), per_id.in_set.len());
        assert_eq!(vectorized.out_set.len(), per_id.out_set.len());
        assert_eq!(vectorized.cross_set.len(), per_id.cross_set.len());
        assert_eq!(vectorized.in_set.len(), 1);
        assert_eq!(vectorized.out_set.len(), 1);
        assert_eq!(vectorized.cross_set.len(), 1);
    }
}
