use std::sync::Arc;
use std::time::Duration;

use chunkedgraph_id::NodeId;
use chunkedgraph_store::{ColKey, DBCol, LockCell, StorageAdapter, Timestamp};

use crate::error::{GraphError, GraphResult};
use crate::metrics::{LOCK_FAILED_TOTAL, LOCK_WAIT_SECONDS};

/// Default lease length for a TTL lock, renewed by the edit path while it
/// still holds work to do on a root (§4.G).
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Acquires and releases root locks via [`StorageAdapter::compare_and_set`]
/// against the `ConcurrencyLock` column, per §4.G.
///
/// A lock is the tuple `(op_id, expires_at, indefinite)` written under the
/// root's row. Acquisition is a bare CAS from "absent or expired" to the
/// caller's own `op_id`; there is no separate queueing or fairness
/// mechanism, matching the source protocol's optimistic-retry design.
pub struct LockManager {
    store: Arc<dyn StorageAdapter>,
}

impl LockManager {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    /// Try to acquire a TTL lock on `root` for `op_id`, retrying up to
    /// `n_tries` times with linear backoff if another operation currently
    /// holds it.
    pub fn lock(&self, root: NodeId, op_id: u64, n_tries: u32) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let new = LockCell::ttl(op_id, self.expiry_ms()).encode();
        let started = std::time::Instant::now();

        for attempt in 0..n_tries.max(1) {
            let current = self.current_cell(root)?;
            if let Some((lock, _, _)) = &current {
                if self.is_live(lock) && lock.op_id != op_id {
                    if attempt + 1 >= n_tries {
                        LOCK_WAIT_SECONDS
                            .with_label_values(&["failed"])
                            .observe(started.elapsed().as_secs_f64());
                        LOCK_FAILED_TOTAL.with_label_values(&["ttl"]).inc();
                        return Err(GraphError::LockFailed(root, n_tries));
                    }
                    std::thread::sleep(Duration::from_millis(20 * (attempt as u64 + 1)));
                    continue;
                }
            }
            let expected = current.as_ref().map(|(_, bytes, _)| bytes.as_slice());
            if self.store.compare_and_set(&key, col.clone(), expected, &new)? {
                LOCK_WAIT_SECONDS.with_label_values(&["acquired"]).observe(started.elapsed().as_secs_f64());
                return Ok(());
            }
        }
        LOCK_WAIT_SECONDS.with_label_values(&["failed"]).observe(started.elapsed().as_secs_f64());
        LOCK_FAILED_TOTAL.with_label_values(&["ttl"]).inc();
        Err(GraphError::LockFailed(root, n_tries))
    }

    /// Acquire locks on every root in `roots`, releasing any already-held
    /// locks and failing the whole batch if one root cannot be locked
    /// (§4.H's multi-root merge/split precondition).
    pub fn lock_many(&self, roots: &[NodeId], op_id: u64, n_tries: u32) -> GraphResult<()> {
        let mut acquired = Vec::new();
        for &root in roots {
            match self.lock(root, op_id, n_tries) {
                Ok(()) => acquired.push(root),
                Err(e) => {
                    for held in acquired {
                        let _ = self.unlock(held, op_id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Extend a held TTL lock's expiry. No-op if the lock is indefinite.
    pub fn renew(&self, root: NodeId, op_id: u64) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let Some((lock, bytes, _)) = self.current_cell(root)? else {
            return Err(GraphError::LockFailed(root, 1));
        };
        if lock.op_id != op_id {
            return Err(GraphError::LockFailed(root, 1));
        }
        if lock.indefinite {
            return Ok(());
        }
        let new = LockCell::ttl(op_id, self.expiry_ms()).encode();
        if self.store.compare_and_set(&key, col, Some(&bytes), &new)? {
            Ok(())
        } else {
            Err(GraphError::LockLost { root, op: op_id })
        }
    }

    /// Release the lock on `root` iff `op_id` still holds it. Never errors
    /// on a lock that is already gone -- unlock is always safe to call
    /// during cleanup.
    pub fn unlock(&self, root: NodeId, op_id: u64) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let Some((lock, bytes, _)) = self.current_cell(root)? else { return Ok(()) };
        if lock.op_id != op_id {
            return Ok(());
        }
        self.store.compare_and_set(&key, col, Some(&bytes), &[])?;
        Ok(())
    }

    /// Escalate a held lock to indefinite, marking the root for manual
    /// repair (§4.G, §4.H's `CommitFailed` terminal state).
    pub fn lock_indefinitely(&self, root: NodeId, op_id: u64) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyIndefiniteLock);
        let new = LockCell::indefinite(op_id).encode();
        self.store.compare_and_set(&key, col, None, &new)?;
        Ok(())
    }

    /// The commit timestamp recorded when `root`'s current lock was written
    /// (§4.G) -- the consistent snapshot timestamp an edit should read
    /// against for the rest of its computation, not the lock's expiry.
    pub fn get_lock_ts(&self, root: NodeId) -> GraphResult<Option<Timestamp>> {
        Ok(self.current_cell(root)?.map(|(_, _, ts)| ts))
    }

    /// Whether `root` currently carries the indefinite "needs manual
    /// repair" marker.
    pub fn is_indefinitely_locked(&self, root: NodeId) -> GraphResult<bool> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyIndefiniteLock);
        let row = self.store.read_row(&key, Some(&[col.clone()]), None)?;
        Ok(row.get(&col).and_then(|cells| cells.first()).is_some())
    }

    /// Unconditionally clear `root`'s TTL lock regardless of which op
    /// currently holds it. Used only by the repair path, which is already
    /// privileged to act on roots the indefinite-lock marker names as
    /// stuck -- everyday callers must go through `unlock`, which checks
    /// ownership first.
    pub fn force_unlock(&self, root: NodeId) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let Some((_, bytes, _)) = self.current_cell(root)? else { return Ok(()) };
        self.store.compare_and_set(&key, col, Some(&bytes), &[])?;
        Ok(())
    }

    /// Clear the indefinite "needs manual repair" marker on `root`, once
    /// the repair path has re-executed its equivalent edit successfully.
    pub fn clear_indefinite(&self, root: NodeId) -> GraphResult<()> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyIndefiniteLock);
        let row = self.store.read_row(&key, Some(&[col.clone()]), None)?;
        let Some(cell) = row.get(&col).and_then(|cells| cells.first()) else { return Ok(()) };
        self.store.compare_and_set(&key, col, Some(&cell.value), &[])?;
        Ok(())
    }

    fn current_cell(&self, root: NodeId) -> GraphResult<Option<(LockCell, Vec<u8>, Timestamp)>> {
        let key = root.to_be_bytes();
        let col = ColKey::plain(DBCol::ConcurrencyLock);
        let row = self.store.read_row(&key, Some(&[col.clone()]), None)?;
        Ok(row.get(&col).and_then(|cells| cells.first()).and_then(|cell| {
            LockCell::decode(&cell.value).map(|lock| (lock, cell.value.clone(), cell.ts))
        }))
    }

    fn is_live(&self, lock: &LockCell) -> bool {
        lock.indefinite || lock.expires_at >= self.now_ms()
    }

    fn expiry_ms(&self) -> u64 {
        self.now_ms() + DEFAULT_LOCK_TTL.as_millis() as u64
    }

    fn now_ms(&self) -> u64 {
        self.store.now()
    }
}

#[cfg(test)]
mod tests {
    use chunkedgraph_id::GraphLayout;
    use chunkedgraph_store::MemAdapter;

    use super::*;

    fn id(n: u64) -> NodeId {
        let layout = GraphLayout::for_test();
        NodeId::encode(&layout, 6, 0, 0, 0, n).unwrap()
    }

    #[test]
    fn lock_then_unlock_allows_reacquire() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let mgr = LockManager::new(store);
        let root = id(1);
        mgr.lock(root, 100, 3).unwrap();
        mgr.unlock(root, 100).unwrap();
        mgr.lock(root, 200, 3).unwrap();
    }

    #[test]
    fn second_op_cannot_steal_live_lock() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let mgr = LockManager::new(store);
        let root = id(2);
        mgr.lock(root, 100, 1).unwrap();
        let err = mgr.lock(root, 200, 1).unwrap_err();
        assert!(matches!(err, GraphError::LockFailed(_, _)));
    }

    #[test]
    fn lock_many_releases_partial_acquisitions_on_failure() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let mgr = LockManager::new(store.clone());
        let a = id(3);
        let b = id(4);
        mgr.lock(b, 999, 1).unwrap();
        let err = mgr.lock_many(&[a, b], 100, 1).unwrap_err();
        assert!(matches!(err, GraphError::LockFailed(_, _)));
        // a should have been released again.
        mgr.lock(a, 111, 1).unwrap();
    }

    #[test]
    fn get_lock_ts_is_close_to_now_not_the_ttl_expiry() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let mgr = LockManager::new(store.clone());
        let root = id(6);
        mgr.lock(root, 100, 1).unwrap();
        let ts = mgr.get_lock_ts(root).unwrap().unwrap();
        // The TTL is 30s; a commit timestamp must land well under that much
        // in the future of `now`, unlike the old `expires_at`-based answer.
        assert!(ts <= store.now());
        assert!(store.now().saturating_sub(ts) < DEFAULT_LOCK_TTL.as_millis() as u64);
    }

    #[test]
    fn force_unlock_clears_a_stuck_lock_from_any_op() {
        let store: Arc<dyn StorageAdapter> = Arc::new(MemAdapter::new());
        let mgr = LockManager::new(store);
        let root = id(5);
        mgr.lock(root, 100, 1).unwrap();
        mgr.lock_indefinitely(root, 100).unwrap();
        assert!(mgr.is_indefinitely_locked(root).unwrap());

        mgr.force_unlock(root).unwrap();
        mgr.lock(root, 200, 1).unwrap();

        mgr.clear_indefinite(root).unwrap();
        assert!(!mgr.is_indefinitely_locked(root).unwrap());
    }
}
