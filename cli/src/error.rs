use thiserror::Error;

/// Errors surfaced at the CLI boundary, carrying the exit code mapping
/// from §6/§4.L: `2` configuration/argument error, `3` storage
/// unreachable, `4` partial completion that needs repair.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Args(String),

    #[error(transparent)]
    Config(#[from] chunkedgraph_node::ConfigError),

    #[error(transparent)]
    Graph(#[from] chunkedgraph_graph::GraphError),

    #[error(transparent)]
    Ingest(#[from] chunkedgraph_ingest::IngestError),

    #[error(transparent)]
    Store(#[from] chunkedgraph_store::StoreError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Args(_) => 2,
            CliError::Config(_) => 2,
            CliError::Store(e) => store_exit_code(e),
            CliError::Graph(chunkedgraph_graph::GraphError::StorageUnavailable(_))
            | CliError::Graph(chunkedgraph_graph::GraphError::Timeout) => 3,
            CliError::Graph(chunkedgraph_graph::GraphError::Store(e)) => store_exit_code(e),
            CliError::Graph(_) => 4,
            CliError::Ingest(chunkedgraph_ingest::IngestError::Store(e)) => store_exit_code(e),
            CliError::Ingest(_) => 4,
        }
    }
}

fn store_exit_code(e: &chunkedgraph_store::StoreError) -> i32 {
    use chunkedgraph_store::StoreError;
    match e {
        StoreError::StorageUnavailable(_) | StoreError::Timeout(_) | StoreError::RocksDb(_) => 3,
        _ => 4,
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chunkedgraph_graph::GraphError;
    use chunkedgraph_id::NodeId;

    #[test]
    fn args_and_config_errors_map_to_two() {
        assert_eq!(CliError::Args("bad".into()).exit_code(), 2);
    }

    #[test]
    fn storage_unavailable_maps_to_three() {
        let err = CliError::Graph(GraphError::StorageUnavailable("down".into()));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn commit_failed_maps_to_four() {
        let err = CliError::Graph(GraphError::CommitFailed { op: 1, reason: "x".into() });
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn lock_failed_maps_to_four() {
        let err = CliError::Graph(GraphError::LockFailed(NodeId::from_raw(9), 3));
        assert_eq!(err.exit_code(), 4);
    }
}
