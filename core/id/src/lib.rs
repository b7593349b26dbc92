//! Bit-packed node identifiers and chunk geometry for the chunked
//! agglomeration graph.
//!
//! This crate is pure and total for valid field ranges: it never talks to
//! storage and never blocks. Everything above layer 1 is built on top of
//! these primitives by `chunkedgraph-graph` and `chunkedgraph-ingest`.

mod chunk;
mod error;
mod layout;
mod node_id;

pub use chunk::{crossing_layer as chunk_crossing_layer, ChunkCoord};
pub use error::{Axis, IdError};
pub use layout::GraphLayout;
pub use node_id::{crossing_layer, NodeId};
