use thiserror::Error;

/// Error kinds for the read and edit paths, per §7.
///
/// `InvalidId` and `PreconditionError` are caller-input errors: surfaced
/// synchronously, never retried. `LockFailed`/`LockLost` are retryable by
/// the caller with backoff (the edit path itself bounds retries during
/// lock acquisition, per §4.H step 2). `CommitFailed` means a guarded write
/// landed partially or not at all after the log was marked pending; the
/// affected roots are left indefinitely locked for the repair path.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    InvalidId(#[from] chunkedgraph_id::IdError),

    #[error("precondition failed: {0}")]
    PreconditionError(String),

    #[error("node {0} not found")]
    NotFound(chunkedgraph_id::NodeId),

    #[error("root walk from {0} terminated before reaching the target layer")]
    RootNotFound(chunkedgraph_id::NodeId),

    #[error("failed to acquire lock on root {0} after {1} attempts")]
    LockFailed(chunkedgraph_id::NodeId, u32),

    #[error("lock lost for root {root} during op {op}")]
    LockLost { root: chunkedgraph_id::NodeId, op: u64 },

    #[error("commit failed after partial write for op {op}: {reason}")]
    CommitFailed { op: u64, reason: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("operation timed out")]
    Timeout,

    #[error(transparent)]
    Store(#[from] chunkedgraph_store::StoreError),
}

pub type GraphResult<T> = Result<T, GraphError>;
