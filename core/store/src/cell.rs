/// Logical timestamp used to order cell versions and to take consistent
/// snapshots. Backed by a plain monotonic counter rather than wall-clock
/// time so that tests (and repair tooling re-deriving a historical view)
/// get a total order without depending on `SystemTime`.
pub type Timestamp = u64;

/// A column, optionally further qualified (e.g. by crossing layer `k` for
/// [`crate::DBCol::ConnectivityCrossChunkEdges`], or by predecessor index
/// for [`crate::DBCol::HierarchyFormerParents`]). Most columns carry an
/// empty qualifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColKey {
    pub col: crate::columns::DBCol,
    pub qualifier: Vec<u8>,
}

impl ColKey {
    pub fn plain(col: crate::columns::DBCol) -> Self {
        Self { col, qualifier: Vec::new() }
    }

    pub fn layer(col: crate::columns::DBCol, layer: u8) -> Self {
        Self { col, qualifier: vec![layer] }
    }
}

/// One versioned cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: Vec<u8>,
    pub ts: Timestamp,
}

/// The result of a `read_row`/`read_rows` call: for each requested column,
/// every cell at or before the snapshot timestamp, newest first.
pub type ColumnCells = std::collections::BTreeMap<ColKey, Vec<Cell>>;
