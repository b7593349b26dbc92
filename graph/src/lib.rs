//! The ChunkedGraph hierarchy itself: read-only traversals, the editor that
//! drives merge/split/multicut/undo/redo, and the row-lock protocol they
//! share (§4.D-H).

mod codec;
mod edges;
mod edit_cache;
mod error;
mod external;
mod lock_manager;
pub mod metrics;
mod oplog;
mod ops;
mod read;

pub use codec::{pack_edge_pairs, pack_ids, unpack_edge_pairs, unpack_ids};
pub use edges::{categorize, Categorized, Edge, EdgeSet};
pub use error::{GraphError, GraphResult};
pub use external::{
    ChunkEdgeFileStore, CoordinateResolver, MinCutSolver, NullOperationLogSink, OperationLogSink,
    RawChunkDataSource, RemeshQueue,
};
pub use lock_manager::{LockManager, DEFAULT_LOCK_TTL};
pub use oplog::{OperationKind, OperationLogEntry, OperationStatus};
pub use ops::{EditOutcome, Editor, MergeRequest, MulticutRequest, RedoRequest, SplitRequest, UndoRequest};
pub use read::{BBox, HierarchyReadService, SubgraphMode, SubgraphResult};
