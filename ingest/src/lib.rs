//! Layer-ordered, dependency-driven ingest scheduler (§4.I).
//!
//! Turns raw per-chunk segmentation exports into the initial hierarchy: one
//! worker pool builds layer-2 nodes from atomic adjacency, then layer-3
//! nodes from layer-2's cross-chunk edges, and so on up to the top layer,
//! each parent chunk becoming ready only once every one of its children has
//! completed.
//!
//! Ingest treats the configured chunk size as exactly one layer-2 chunk's
//! footprint: a supervoxel's encoded chunk coordinate is the same
//! `(cx, cy, cz)` as the layer-2 chunk that contains it, rather than a
//! finer grid related to it by `GraphLayout::fanout`. `ChunkCoord`'s
//! generic ancestor/descendant folding is still used everywhere from layer
//! 2 upward; ingest simply never calls it for the layer-1-to-2 step.

mod codec;
mod error;
mod leaf;
mod metrics;
mod parent;
mod pending;
mod plan;
mod scheduler;
mod union_find;

pub use error::{IngestError, IngestResult};
pub use leaf::LeafSummary;
pub use parent::ParentSummary;
pub use plan::IngestPlan;
pub use scheduler::{IngestScheduler, IngestSummary};
