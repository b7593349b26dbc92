use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};

use crate::adapter::{Mutation, RowKey, StorageAdapter, WriteGuard};
use crate::cell::{Cell, ColKey, ColumnCells, Timestamp};
use crate::columns::DBCol;
use crate::error::{StoreError, StoreResult};
use crate::lock_cell::LockCell;
use crate::memory::now_ms;

/// RocksDB-backed [`StorageAdapter`].
///
/// Each [`DBCol`] gets its own column family, mirroring `near-store`'s
/// one-CF-per-logical-column layout (see `core/store/src/columns.rs` in the
/// upstream codebase this is patterned on). Within a column family, a row's
/// cell history is stored as one RocksDB entry per `(qualifier, version)`,
/// keyed so that iterating forward from a row's prefix yields versions
/// newest-first -- see [`encode_versioned_key`].
///
/// A single process-wide mutex serializes the read-modify-write sequences
/// (`write` with guards, `compare_and_set`, `allocate_counter`) that need
/// atomicity stronger than a plain RocksDB `WriteBatch` gives us. The real
/// wide-column backend this stands in for (§6) offers native
/// compare-and-mutate; this adapter is the embeddable reference
/// implementation of the same contract, not a drop-in for that backend.
pub struct RocksAdapter {
    db: DB,
    cas_lock: Mutex<()>,
    last_ts: AtomicU64,
}

impl RocksAdapter {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cfs: Vec<ColumnFamilyDescriptor> = DBCol::iter()
            .map(|col| ColumnFamilyDescriptor::new(col.cf_name(), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cfs)?;
        Ok(Self { db, cas_lock: Mutex::new(()), last_ts: AtomicU64::new(0) })
    }

    fn cf(&self, col: DBCol) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(col.cf_name()).expect("column family declared at open time")
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

    fn latest_cell(&self, key: &[u8], col: &ColKey, at: Timestamp) -> StoreResult<Option<Cell>> {
        let prefix = encode_prefix(key, &col.qualifier);
        let cf = self.cf(col.col);
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (raw_key, value) = item?;
            if !raw_key.starts_with(&prefix) {
                break;
            }
            let ts = decode_ts(&raw_key, prefix.len());
            if ts <= at {
                return Ok(Some(Cell { value: value.to_vec(), ts }));
            }
        }
        Ok(None)
    }

    fn read_all_versions(
        &self,
        key: &[u8],
        col: &ColKey,
        at: Timestamp,
    ) -> StoreResult<Vec<Cell>> {
        let prefix = encode_prefix(key, &col.qualifier);
        let cf = self.cf(col.col);
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (raw_key, value) = item?;
            if !raw_key.starts_with(&prefix) {
                break;
            }
            let ts = decode_ts(&raw_key, prefix.len());
            if ts <= at {
                out.push(Cell { value: value.to_vec(), ts });
            }
        }
        Ok(out)
    }

    fn check_guard(&self, guard: &WriteGuard, at: Timestamp) -> StoreResult<()> {
        let key = guard.root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let cell = self.latest_cell(&key, &col, at)?;
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

/// `[row_key_len: u32 BE][row_key][qualifier]`
fn encode_prefix(key: &[u8], qualifier: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + key.len() + qualifier.len());
    out.extend_from_slice(&(key.len() as u32).to_be_bytes());
    out.extend_from_slice(key);
    out.extend_from_slice(qualifier);
    out
}

/// Appends the bitwise-complemented timestamp so that ascending RocksDB
/// iteration order (the only order it offers) yields descending `ts`,
/// i.e. newest-first -- the ordering §4.B's `read_row` promises.
fn encode_versioned_key(key: &[u8], qualifier: &[u8], ts: Timestamp) -> Vec<u8> {
    let mut out = encode_prefix(key, qualifier);
    out.extend_from_slice(&(!ts).to_be_bytes());
    out
}

fn decode_ts(raw_key: &[u8], prefix_len: usize) -> Timestamp {
    let ts_bytes: [u8; 8] = raw_key[prefix_len..prefix_len + 8].try_into().unwrap();
    !u64::from_be_bytes(ts_bytes)
}

impl StorageAdapter for RocksAdapter {
    fn read_row(
        &self,
        key: &[u8],
        cols: Option<&[ColKey]>,
        at_or_before: Option<Timestamp>,
    ) -> StoreResult<ColumnCells> {
        let at = at_or_before.unwrap_or_else(|| self.now());
        let mut out = ColumnCells::new();
        let candidates: Vec<ColKey> = match cols {
            Some(cols) => cols.to_vec(),
            None => DBCol::iter().map(ColKey::plain).collect(),
        };
        for col in candidates {
            let cells = self.read_all_versions(key, &col, at)?;
            if !cells.is_empty() {
                out.insert(col, cells);
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
        let cf = self.cf(col);
        let start_prefix = encode_prefix(start, &[]);
        let iter = self.db.iterator_cf(cf, IteratorMode::From(&start_prefix, Direction::Forward));
        let mut out: Vec<(RowKey, Vec<Cell>)> = Vec::new();
        for item in iter {
            let (raw_key, value) = item?;
            if raw_key.len() < 4 {
                continue;
            }
            let klen = u32::from_be_bytes(raw_key[0..4].try_into().unwrap()) as usize;
            if 4 + klen > raw_key.len() {
                continue;
            }
            let row_key = raw_key[4..4 + klen].to_vec();
            if row_key.as_slice() >= end {
                break;
            }
            let ts = decode_ts(&raw_key, 4 + klen);
            if ts > at {
                continue;
            }
            match out.last_mut() {
                Some((k, cells)) if *k == row_key => cells.push(Cell { value: value.to_vec(), ts }),
                _ => out.push((row_key, vec![Cell { value: value.to_vec(), ts }])),
            }
        }
        Ok(out)
    }

    fn write(&self, mutations: Vec<Mutation>, guards: &[WriteGuard]) -> StoreResult<Timestamp> {
        let _guard = self.cas_lock.lock();
        let ts = self.next_ts();
        for guard in guards {
            self.check_guard(guard, ts)?;
        }
        let mut batch = rocksdb::WriteBatch::default();
        for mutation in &mutations {
            let raw_key = encode_versioned_key(&mutation.key, &mutation.col.qualifier, ts);
            batch.put_cf(self.cf(mutation.col.col), raw_key, &mutation.value);
        }
        self.db.write(batch)?;
        Ok(ts)
    }

    fn compare_and_set(
        &self,
        key: &[u8],
        col: ColKey,
        expected: Option<&[u8]>,
        new: &[u8],
    ) -> StoreResult<bool> {
        let _guard = self.cas_lock.lock();
        let ts = self.next_ts();
        let current = self.latest_cell(key, &col, ts)?;
        if current.as_ref().map(|c| c.value.as_slice()) != expected {
            return Ok(false);
        }
        let raw_key = encode_versioned_key(key, &col.qualifier, ts);
        self.db.put_cf(self.cf(col.col), raw_key, new)?;
        Ok(true)
    }

    fn allocate_counter(&self, key: &[u8], col: ColKey, n: u64) -> StoreResult<u64> {
        let _guard = self.cas_lock.lock();
        let ts = self.next_ts();
        let current = self
            .latest_cell(key, &col, ts)?
            .map(|c| u64::from_be_bytes(c.value.try_into().unwrap_or([0; 8])))
            .unwrap_or(0);
        let next = current + n;
        let raw_key = encode_versioned_key(key, &col.qualifier, ts);
        self.db.put_cf(self.cf(col.col), raw_key, &next.to_be_bytes())?;
        Ok(current)
    }

    fn now(&self) -> Timestamp {
        self.last_ts.load(Ordering::SeqCst).max(now_ms())
    }
}
