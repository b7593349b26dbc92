use thiserror::Error;

/// Errors from building a layer of the hierarchy during ingest. Per §4.I,
/// these are always about one chunk's task; a failure there is reported in
/// the scheduler's summary rather than aborting the whole run, so sibling
/// chunks at the same layer keep making progress.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("raw data source failed for chunk {chunk:?}: {source}")]
    RawSource { chunk: chunkedgraph_id::ChunkCoord, source: std::io::Error },

    #[error(transparent)]
    Store(#[from] chunkedgraph_store::StoreError),

    #[error(transparent)]
    Id(#[from] chunkedgraph_id::IdError),

    #[error(transparent)]
    Graph(#[from] chunkedgraph_graph::GraphError),

    #[error("ingest plan is invalid: {0}")]
    InvalidPlan(String),
}

pub type IngestResult<T> = Result<T, IngestError>;
