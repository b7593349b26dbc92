//! Thin interfaces for the collaborators §1 keeps out of scope: the raw
//! supervoxel/watershed fetchers, the chunk-edge file store, the min-cut
//! solver, the remeshing worker, and the operation-log analytics sink.
//!
//! Everything in this module is a trait; `chunkedgraph-graph` never
//! constructs a concrete implementation of one. Binaries (`chunkedgraph-cli`,
//! `chunkedgraph-ingest`) wire in real ones.

use chunkedgraph_id::{ChunkCoord, NodeId};

use crate::edges::{Edge, EdgeSet};
use crate::oplog::OperationLogEntry;

/// Supplies the atomic adjacency and watershed component data ingest needs
/// to build layer 2; §6's "raw-data fetchers".
pub trait RawChunkDataSource: Send + Sync {
    /// Every atomic edge whose lower endpoint lies in `chunk`, read from
    /// the upstream segmentation pipeline's edge export.
    fn atomic_edges(&self, chunk: ChunkCoord) -> std::io::Result<EdgeSet>;

    /// The watershed-derived supervoxel ids present in `chunk`.
    fn supervoxels(&self, chunk: ChunkCoord) -> std::io::Result<Vec<NodeId>>;
}

/// Immutable, chunk-addressed atomic edge files materialized outside the
/// hierarchy rows themselves (§6 "chunk-edge files"). The read path fetches
/// these on demand for subgraph queries.
pub trait ChunkEdgeFileStore: Send + Sync {
    fn read_chunk_edges(&self, chunk: ChunkCoord) -> std::io::Result<EdgeSet>;
}

/// Resolves a set of source/sink supervoxel coordinates to ids, e.g. from a
/// point annotation UI; out of scope per §1 ("resolve input supervoxels
/// from coordinates").
pub trait CoordinateResolver: Send + Sync {
    fn resolve(&self, coordinate: [f64; 3]) -> std::io::Result<NodeId>;
}

/// Minimum-cut solver over a weighted undirected graph, used by the
/// Multicut operation. Affinities are capacities.
pub trait MinCutSolver: Send + Sync {
    /// Returns the edges to remove to separate `sources` from `sinks`, or
    /// `None` if no finite cut exists (e.g. they're already disconnected).
    fn min_cut(
        &self,
        edges: &EdgeSet,
        sources: &[NodeId],
        sinks: &[NodeId],
    ) -> Option<Vec<Edge>>;
}

/// Enqueues a remesh job for a changed supervoxel set; fire-and-forget from
/// the edit path's point of view.
pub trait RemeshQueue: Send + Sync {
    fn enqueue(&self, changed_supervoxels: &[NodeId]);
}

/// Sink for completed operation log entries, feeding the analytics store
/// that's out of scope per §1. The edit path's own "pending"/"complete"
/// bookkeeping lives in storage (§6); this is a secondary, best-effort
/// fan-out for dashboards and audits.
pub trait OperationLogSink: Send + Sync {
    fn record(&self, entry: &OperationLogEntry);
}

/// A no-op sink, used in tests and by tools that don't need analytics
/// fan-out.
#[derive(Default)]
pub struct NullOperationLogSink;

impl OperationLogSink for NullOperationLogSink {
    fn record(&self, _entry: &OperationLogEntry) {}
}
