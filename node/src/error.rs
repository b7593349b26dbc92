use thiserror::Error;

/// Errors raised while loading or validating process configuration, or
/// while wiring a storage adapter from it. Always non-retryable: surfaced
/// before any edit or ingest work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid process configuration: {0}")]
    Invalid(String),

    #[error("unknown virtual table alias {0:?}")]
    UnknownVirtualTable(String),

    #[error("failed to read virtual table file {path:?}: {reason}")]
    VirtualTableFile { path: std::path::PathBuf, reason: String },

    #[error(transparent)]
    Storage(#[from] chunkedgraph_store::StoreError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
