use chunkedgraph_id::NodeId;
use serde::{Deserialize, Serialize};

use crate::edges::Edge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum OperationKind {
    Merge,
    Split,
    Multicut,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum OperationStatus {
    Pending,
    Complete,
    Failed,
}

/// An immutable record of one user-visible edit, keyed by operation id.
/// Written "pending" before the guarded commit and flipped to
/// "complete"/"failed" afterward (§4.H step 6-8). Never mutated beyond that
/// status transition -- everything else about the entry is fixed at
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub op_id: u64,
    pub kind: OperationKind,
    pub user: String,
    pub client_timestamp_ms: u64,
    pub commit_timestamp: Option<u64>,
    pub status: OperationStatus,
    pub old_roots: Vec<NodeId>,
    pub new_roots: Vec<NodeId>,
    pub added_edges: Vec<(NodeId, NodeId)>,
    pub removed_edges: Vec<(NodeId, NodeId)>,
    pub source_supervoxels: Vec<NodeId>,
    pub sink_supervoxels: Vec<NodeId>,
    pub bbox_offset: Option<[u32; 3]>,
    /// Set when this entry is an undo/redo: the op it targets.
    pub references_op: Option<u64>,
    pub exception: Option<String>,
}

impl OperationLogEntry {
    pub fn pending(
        op_id: u64,
        kind: OperationKind,
        user: String,
        client_timestamp_ms: u64,
        old_roots: Vec<NodeId>,
    ) -> Self {
        Self {
            op_id,
            kind,
            user,
            client_timestamp_ms,
            commit_timestamp: None,
            status: OperationStatus::Pending,
            old_roots,
            new_roots: Vec::new(),
            added_edges: Vec::new(),
            removed_edges: Vec::new(),
            source_supervoxels: Vec::new(),
            sink_supervoxels: Vec::new(),
            bbox_offset: None,
            references_op: None,
            exception: None,
        }
    }

    pub fn edges_added(mut self, edges: &[Edge]) -> Self {
        self.added_edges = edges.iter().map(Edge::endpoints).collect();
        self
    }

    pub fn edges_removed(mut self, edges: &[Edge]) -> Self {
        self.removed_edges = edges.iter().map(Edge::endpoints).collect();
        self
    }

    pub fn complete(mut self, commit_ts: u64, new_roots: Vec<NodeId>) -> Self {
        self.status = OperationStatus::Complete;
        self.commit_timestamp = Some(commit_ts);
        self.new_roots = new_roots;
        self
    }

    pub fn failed(mut self, exception: String) -> Self {
        self.status = OperationStatus::Failed;
        self.exception = Some(exception);
        self
    }
}
