//! Process configuration and storage wiring for a chunked graph instance
//! (§4.K): everything a binary needs to go from environment variables to a
//! connected [`chunkedgraph_store::StorageAdapter`] and a validated
//! [`chunkedgraph_id::GraphLayout`], kept separate from the graph library
//! itself so `chunkedgraph-graph` never depends on how a process is
//! configured.

mod config;
mod error;
mod storage;

pub use config::{ProcessConfig, VirtualTable, VirtualTables};
pub use error::{ConfigError, ConfigResult};
pub use storage::open;
