use crate::cell::{Cell, ColKey, ColumnCells, Timestamp};
use crate::columns::DBCol;
use crate::error::StoreResult;

pub type RowKey = Vec<u8>;

/// A guard names the root + operation id that must still hold the current
/// lock for a guarded write to commit. Every write in the edit path names
/// one; storage rejects the whole batch if any listed guard's lock column
/// no longer matches `(op_id, mode, expires_at >= now)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteGuard {
    pub root: u64,
    pub op_id: u64,
}

/// One cell write within a batch: set column `col` of row `key` to `value`,
/// committed at the timestamp the adapter assigns to the whole batch.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub key: RowKey,
    pub col: ColKey,
    pub value: Vec<u8>,
}

impl Mutation {
    pub fn new(key: RowKey, col: ColKey, value: Vec<u8>) -> Self {
        Self { key, col, value }
    }
}

/// Row-oriented, versioned wide-column storage, per §4.B.
///
/// Every write that participates in the edit path (merge/split/multicut)
/// names a [`WriteGuard`]; the adapter is the sole arbiter of whether that
/// guard still holds, and `write` must check and apply atomically from the
/// caller's point of view -- no partial application of a guarded batch is
/// ever observable.
pub trait StorageAdapter: Send + Sync {
    /// Every cell of every requested column in `key`, at or before
    /// `at_or_before` if given (defaults to "now"), newest first within
    /// each column. Columns not passed default to every column that has
    /// data for this row. Missing columns come back absent from the map,
    /// never as an empty-but-present entry.
    fn read_row(
        &self,
        key: &[u8],
        cols: Option<&[ColKey]>,
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<ColumnCells>;

    /// Vectorized form of `read_row` over an explicit key list.
    fn read_rows(
        &self,
        keys: &[RowKey],
        cols: Option<&[ColKey]>,
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<Vec<ColumnCells>> {
        keys.iter().map(|k| self.read_row(k, cols, at_or_before)).collect()
    }

    /// Every row whose key falls in `[start, end)`, restricted to `cols`.
    fn scan_range(
        &self,
        col: DBCol,
        start: &[u8],
        end: &[u8],
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<Vec<(RowKey, Vec<Cell>)>>;

    /// Apply `mutations` atomically. If `guard` is given, the whole batch is
    /// rejected with `StoreError::LockLost` unless every named root's lock
    /// column still matches the guard's `op_id` and has not expired.
    /// Returns the commit timestamp assigned to every mutation in the
    /// batch -- readers using that timestamp as `at_or_before` see exactly
    /// this write and nothing after it.
    fn write(&self, mutations: Vec<Mutation>, guards: &[WriteGuard]) -> StoreResult<Timestamp>;

    /// Atomic compare-and-set on a single cell: set `col` of `key` to `new`
    /// iff its current value (ignoring version history; only the latest
    /// cell is compared) equals `expected`. Returns whether the swap took
    /// place. The primitive the Lock Manager is built on.
    fn compare_and_set(
        &self,
        key: &[u8],
        col: ColKey,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool>;

    /// Atomically reserve `n` contiguous values in a monotonic counter
    /// stored at `key`/`col`, returning the first reserved value. Backs
    /// both the per-chunk segment counter and the global operation counter.
    fn allocate_counter(&self, key: &[u8], col: ColKey, n: u64) -> StoreResult<u64>;

    /// A timestamp that is guaranteed to be `>=` the commit timestamp of
    /// every write that has returned to a caller so far. Used as the
    /// default snapshot for reads that don't pin an explicit `at`.
    fn now(&self) -> Timestamp;
}
