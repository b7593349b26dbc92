use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::adapter::{Mutation, RowKey, StorageAdapter, WriteGuard};
use crate::cell::{Cell, ColKey, ColumnCells, Timestamp};
use crate::columns::DBCol;
use crate::error::{StoreError, StoreResult};
use crate::lock_cell::LockCell;

/// An in-process storage adapter backed by nested `BTreeMap`s, guarded by a
/// single `RwLock`.
///
/// Used by unit tests across `chunkedgraph-graph` and `chunkedgraph-ingest`
/// and by the `status`/`repair` CLI subcommands against a throwaway graph.
/// It implements exactly the same guard and versioning contract as
/// [`crate::rocks::RocksAdapter`]; tests written against one should hold
/// against the other.
#[derive(Default)]
pub struct MemAdapter {
    rows: RwLock<BTreeMap<RowKey, BTreeMap<ColKey, Vec<Cell>>>>,
    last_ts: AtomicU64,
}

impl MemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ts(&self) -> Timestamp {
        let wall = now_ms();
        loop {
            let prev = self.last_ts.load(Ordering::SeqCst);
            let candidate = wall.max(prev + 1);
            if self
                .last_ts
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return candidate;
            }
        }
    }

    fn latest(cells: &BTreeMap<ColKey, Vec<Cell>>, col: &ColKey, at: Timestamp) -> Option<Cell> {
        cells.get(col)?.iter().rev().find(|c| c.ts <= at).cloned()
    }

    fn check_guard(
        &self,
        rows: &BTreeMap<RowKey, BTreeMap<ColKey, Vec<Cell>>>,
        guard: &WriteGuard,
        at: Timestamp,
    ) -> StoreResult<()> {
        let key = guard.root.to_be_bytes().to_vec();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let cell = rows.get(&key).and_then(|cols| Self::latest(cols, &col, at));
        let ok = match cell {
            Some(cell) => match LockCell::decode(&cell.value) {
                Some(lock) => {
                    lock.op_id == guard.op_id && (lock.indefinite || lock.expires_at >= now_ms())
                }
                None => false,
            },
            None => false,
        };
        if ok {
            Ok(())
        } else {
            Err(StoreError::LockLost { root: guard.root, op: guard.op_id })
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

impl StorageAdapter for MemAdapter {
    fn read_row(
        &self,
        key: &[u8],
        cols: Option<&[ColKey]>,
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<ColumnCells> {
        let at = at_or_before.unwrap_or_else(|| self.now());
        let rows = self.rows.read();
        let mut out = ColumnCells::new();
        let Some(row) = rows.get(key) else { return Ok(out) };
        let wanted: Box<dyn Fn(&ColKey) -> bool> = match cols {
            Some(cols) => {
                let cols: Vec<ColKey> = cols.to_vec();
                Box::new(move |c| cols.contains(c))
            }
            None => Box::new(|_| true),
        };
        for (col, cells) in row.iter() {
            if !wanted(col) {
                continue;
            }
            let visible: Vec<Cell> = cells.iter().filter(|c| c.ts <= at).rev().cloned().collect();
            if !visible.is_empty() {
                out.insert(col.clone(), visible);
            }
        }
        Ok(out)
    }

    fn scan_range(
        &self,
        col: DBCol,
        start: &[u8],
        end: &[u8],
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<Vec<(RowKey, Vec<Cell>)>> {
        let at = at_or_before.unwrap_or_else(|| self.now());
        let rows = self.rows.read();
        let mut out = Vec::new();
        for (key, cols) in rows.range(start.to_vec()..end.to_vec()) {
            let plain = ColKey::plain(col);
            if let Some(cells) = cols.get(&plain) {
                let visible: Vec<Cell> = cells.iter().filter(|c| c.ts <= at).rev().cloned().collect();
                if !visible.is_empty() {
                    out.push((key.clone(), visible));
                }
            }
        }
        Ok(out)
    }

    fn write(&self, mutations: Vec<Mutation>, guards: &[WriteGuard]) -> StoreResult<Timestamp> {
        let mut rows = self.rows.write();
        let ts = self.next_ts();
        for guard in guards {
            self.check_guard(&rows, guard, ts)?;
        }
        for mutation in mutations {
            let row = rows.entry(mutation.key).or_default();
            row.entry(mutation.col).or_default().push(Cell { value: mutation.value, ts });
        }
        Ok(ts)
    }

    fn compare_and_set(
        &self,
        key: &[u8],
        col: ColKey,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        let mut rows = self.rows.write();
        let ts = self.next_ts();
        let row = rows.entry(key.to_vec()).or_default();
        let cells = row.entry(col).or_default();
        let current = cells.last().map(|c| c.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        cells.push(Cell { value: new.to_vec(), ts });
        Ok(true)
    }

    fn allocate_counter(&self, key: &[u8], col: ColKey, n: u64) -> StoreResult<u64> {
        let mut rows = self.rows.write();
        let ts = self.next_ts();
        let row = rows.entry(key.to_vec()).or_default();
        let cells = row.entry(col).or_default();
        let current = cells
            .last()
            .map(|c| u64::from_be_bytes(c.value.clone().try_into().unwrap_or([0; 8])))
            .unwrap_or(0);
        let next = current + n;
        cells.push(Cell { value: next.to_be_bytes().to_vec(), ts });
        Ok(current)
    }

    fn now(&self) -> Timestamp {
        self.last_ts.load(Ordering::SeqCst).max(now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_and_set_rejects_stale_expectation() {
        let store = MemAdapter::new();
        let col = ColKey::plain(DBCol::GraphMeta);
        assert!(store.compare_and_set(b"k", col.clone(), None, b"v1").unwrap());
        assert!(!store.compare_and_set(b"k", col.clone(), None, b"v2").unwrap());
        assert!(store.compare_and_set(b"k", col, Some(b"v1"), b"v2").unwrap());
    }

    #[test]
    fn allocate_counter_hands_out_disjoint_ranges() {
        let store = MemAdapter::new();
        let col = ColKey::plain(DBCol::ChunkSegmentCounter);
        let first = store.allocate_counter(b"chunk", col.clone(), 10).unwrap();
        let second = store.allocate_counter(b"chunk", col, 5).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 10);
    }

    #[test]
    fn write_without_guard_never_fails() {
        let store = MemAdapter::new();
        let m = Mutation::new(b"row".to_vec(), ColKey::plain(DBCol::HierarchyChildren), b"x".to_vec());
        assert!(store.write(vec![m], &[]).is_ok());
    }

    #[test]
    fn write_rejects_when_guard_lock_missing() {
        let store = MemAdapter::new();
        let m = Mutation::new(b"row".to_vec(), ColKey::plain(DBCol::HierarchyChildren), b"x".to_vec());
        let err = store.write(vec![m], &[WriteGuard { root: 1, op_id: 9 }]).unwrap_err();
        assert!(matches!(err, StoreError::LockLost { root: 1, op: 9 }));
    }
}
