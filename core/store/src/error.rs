use thiserror::Error;

/// Errors surfaced by the storage adapter.
///
/// `LockLost` and `StorageUnavailable`/`Timeout` are retryable by callers
/// (the edit path retries `StorageUnavailable`/`Timeout` internally within a
/// bounded number of attempts; `LockLost` is propagated so the edit
/// operation can decide whether to re-resolve roots and retry).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("guard violated: root {root} no longer holds the expected lock for op {op}")]
    LockLost { root: u64, op: u64 },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("row not found for key {0:?}")]
    NotFound(Vec<u8>),

    #[error("corrupt cell value in column {col:?}: {reason}")]
    CorruptValue { col: &'static str, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;
