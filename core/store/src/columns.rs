/// This enum holds the information about the logical columns we keep in the
/// wide-column store.
///
/// Think of storage as a 3-dimensional table: row key, column, and cell
/// version (commit timestamp). Each variant here corresponds to one RocksDB
/// column family (see [`DBCol::cf_name`]); the "cross chunk edges" and
/// "former parents" columns are additionally qualified by a layer number or
/// predecessor index within the row, since a single layer-2 node's cross
/// edges span every ancestor layer up to `L`.
///
/// Note: it is *not* safe to rename a variant after rows have been written
/// under its RocksDB column family name. Deprecate by prefixing with `_`
/// rather than deleting.
#[derive(
    PartialEq, Eq, Copy, Clone, Debug, Hash, Ord, PartialOrd, strum::EnumIter, strum::IntoStaticStr,
)]
pub enum DBCol {
    /// Most recent parent of a node, versioned.
    /// - *Rows*: node id (8 bytes, big-endian).
    /// - *Content*: node id (8 bytes, big-endian), one cell per edit.
    HierarchyParent,
    /// Direct children of a node, as they stand after the edit that wrote
    /// this cell.
    /// - *Rows*: node id.
    /// - *Content*: packed array of child node ids.
    HierarchyChildren,
    /// Set once, when a node becomes historical: the nodes that replaced it.
    /// - *Rows*: node id.
    /// - *Content*: packed array of successor node ids.
    HierarchyNewParents,
    /// Predecessors of a node that replaced them, indexed by the qualifier
    /// (the operation id that performed the replacement).
    /// - *Rows*: node id.
    /// - *Content*: packed array of predecessor node ids.
    HierarchyFormerParents,
    /// Atomic adjacency: the partner endpoint of each atomic edge incident
    /// to this supervoxel, appended per edit (latest-wins at a timestamp;
    /// tombstones are recorded as a removal cell, see [`crate::edge_row`]).
    /// - *Rows*: supervoxel id.
    ConnectivityAtomicPartners,
    /// Parallel column to `ConnectivityAtomicPartners`: affinities.
    ConnectivityAtomicAffinities,
    /// Parallel column to `ConnectivityAtomicPartners`: areas.
    ConnectivityAtomicAreas,
    /// Cross-chunk edges of a layer-2 node, qualified by crossing layer `k`.
    /// - *Rows*: layer-2 node id.
    /// - *Content*: packed `(u, v)` id pairs, deduplicated.
    ConnectivityCrossChunkEdges,
    /// `(op_id, expires_at, mode)` lock tuple.
    /// - *Rows*: root node id.
    ConcurrencyLock,
    /// Presence indicates the subtree under this root needs manual repair.
    /// - *Rows*: root node id.
    ConcurrencyIndefiniteLock,
    /// Single-row graph metadata: layer count, fanout, chunk size, field
    /// widths. Written once at graph creation.
    GraphMeta,
    /// Per-chunk monotonic segment counter.
    /// - *Rows*: chunk coordinate key (layer, x, y, z).
    ChunkSegmentCounter,
    /// Single-row global monotonic operation id counter.
    OperationCounter,
    /// Operation log entries, keyed by operation id.
    OperationLog,
}

impl DBCol {
    /// The RocksDB column family name. Intentionally distinct from the
    /// `Debug` output so that renaming a Rust variant (to fix a typo, say)
    /// never silently changes on-disk column family names.
    pub fn cf_name(self) -> &'static str {
        match self {
            DBCol::HierarchyParent => "hierarchy_parent",
            DBCol::HierarchyChildren => "hierarchy_children",
            DBCol::HierarchyNewParents => "hierarchy_new_parents",
            DBCol::HierarchyFormerParents => "hierarchy_former_parents",
            DBCol::ConnectivityAtomicPartners => "connectivity_atomic_partners",
            DBCol::ConnectivityAtomicAffinities => "connectivity_atomic_affinities",
            DBCol::ConnectivityAtomicAreas => "connectivity_atomic_areas",
            DBCol::ConnectivityCrossChunkEdges => "connectivity_cross_chunk_edges",
            DBCol::ConcurrencyLock => "concurrency_lock",
            DBCol::ConcurrencyIndefiniteLock => "concurrency_indefinite_lock",
            DBCol::GraphMeta => "graph_meta",
            DBCol::ChunkSegmentCounter => "chunk_segment_counter",
            DBCol::OperationCounter => "operation_counter",
            DBCol::OperationLog => "operation_log",
        }
    }

    pub fn iter() -> impl Iterator<Item = DBCol> {
        use strum::IntoEnumIterator;
        <DBCol as IntoEnumIterator>::iter()
    }
}
