//! Versioned wide-column storage adapter, per §4.B.
//!
//! Exposes one trait, [`StorageAdapter`], and two implementations: an
//! in-memory one for tests and small tools, and a RocksDB-backed one for
//! everything else. Nothing above this crate is allowed to assume which
//! implementation it's talking to.

mod adapter;
pub mod allocator;
mod cell;
mod columns;
mod error;
mod lock_cell;
pub mod memory;
pub mod meta;
pub mod rocks;

pub use adapter::{Mutation, RowKey, StorageAdapter, WriteGuard};
pub use allocator::IdAllocator;
pub use cell::{Cell, ColKey, ColumnCells, Timestamp};
pub use columns::DBCol;
pub use error::{StoreError, StoreResult};
pub use lock_cell::LockCell;
pub use memory::MemAdapter;
pub use meta::GraphMeta;
pub use rocks::RocksAdapter;

use chunkedgraph_id::NodeId;

/// The row key under which a node's hierarchy/connectivity cells live.
pub fn node_key(id: NodeId) -> RowKey {
    id.to_be_bytes().to_vec()
}
