//! Lock manager.

use crate::config::LockManagerConfig;
use crate::lock::entry::{LockEntry, LockRequest};
use crate::lock::transaction::TransactionEntry;
use crate::lock::waiter::LockWaiter;
use crate::lock::LockMode;
use crate::stats::LockStats;
use crate::types::{ResourceId, TransactionId};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

/// Result of [`LockManager::acquire_lock`].
#[derive(Debug)]
pub enum Acquire {
    /// The lock was granted on arrival.
    Granted,
    /// The request was queued; the waiter resolves on grant or abort.
    Waiting(LockWaiter),
}

impl Acquire {
    /// Returns true if the lock was granted on arrival.
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquire::Granted)
    }

    /// Returns the waiter for a queued request.
    pub fn into_waiter(self) -> Option<LockWaiter> {
        match self {
            Acquire::Granted => None,
            Acquire::Waiting(waiter) => Some(waiter),
        }
    }
}

/// A resource whose wait queue was cleared by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedQueue {
    /// The stalled resource.
    pub resource_id: ResourceId,
    /// Transactions whose requests were dropped, in queue order.
    pub transactions: Vec<TransactionId>,
}

/// Outcome of one [`LockManager::detect_deadlocks`] sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionReport {
    /// Resources examined.
    pub scanned: usize,
    /// Queues that were cleared.
    pub aborted: Vec<AbortedQueue>,
}

impl DetectionReport {
    /// Returns the total number of dropped requests.
    pub fn aborted_waiters(&self) -> usize {
        self.aborted.iter().map(|q| q.transactions.len()).sum()
    }
}

/// Everything guarded by the lock-table gate.
#[derive(Debug, Default)]
struct LockTable {
    resources: HashMap<ResourceId, LockEntry>,
    transactions: HashMap<TransactionId, TransactionEntry>,
    /// Resources that queued a request since they were last checked.
    worklist: Vec<ResourceId>,
}

impl LockTable {
    fn register(&mut self, transaction_id: TransactionId, resource_id: ResourceId, mode: LockMode) {
        self.transactions
            .entry(transaction_id)
            .or_insert_with(TransactionEntry::new)
            .add_lock(resource_id, mode);
    }

    fn unregister(&mut self, transaction_id: TransactionId, resource_id: ResourceId, mode: LockMode) {
        if let Some(entry) = self.transactions.get_mut(&transaction_id) {
            entry.remove_lock(resource_id, mode);
            if entry.is_empty() {
                self.transactions.remove(&transaction_id);
            }
        }
    }
}

/// Multi-granularity lock manager.
///
/// Owns the resource table and the transaction table. Every acquire,
/// release and detector sweep runs under one gate, so grant decisions are
/// atomic across the whole table.
///
/// Wait queues are strictly FIFO: a request queues whenever the resource
/// already has waiters, and each release promotes at most one waiter.
/// Queued requests are never retried on their own.
pub struct LockManager {
    table: Mutex<LockTable>,
    config: LockManagerConfig,
    stats: LockStats,
}

impl LockManager {
    /// Creates a lock manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(LockManagerConfig::default())
    }

    /// Creates a lock manager with custom configuration.
    pub fn with_config(config: LockManagerConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            config,
            stats: LockStats::new(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Requests `mode` on `resource_id` for `transaction_id`.
    ///
    /// Grants immediately when the resource has no waiters and `mode` is
    /// compatible with every granted mode. Otherwise the request is queued
    /// and the returned waiter resolves once a release promotes it or the
    /// detector aborts it.
    pub fn acquire_lock(
        &self,
        transaction_id: TransactionId,
        resource_id: ResourceId,
        mode: LockMode,
    ) -> Acquire {
        let mut table = self.table.lock();
        let entry = table.resources.entry(resource_id).or_insert_with(LockEntry::new);

        if entry.can_grant_immediately(mode) {
            entry.grant(mode);
            table.register(transaction_id, resource_id, mode);
            self.stats.record_acquisition();
            debug!(%transaction_id, %resource_id, %mode, "lock granted");
            return Acquire::Granted;
        }

        let (waiter, signal) = LockWaiter::new(transaction_id, resource_id, mode);
        entry.enqueue(LockRequest {
            transaction_id,
            mode,
            enqueued_at: Instant::now(),
            signal,
        });
        table.worklist.push(resource_id);
        self.stats.record_wait();
        debug!(%transaction_id, %resource_id, %mode, "lock request queued");
        Acquire::Waiting(waiter)
    }

    /// Releases one grant of `mode` on `resource_id`.
    ///
    /// If the queue head is then compatible with the remaining grants it is
    /// dequeued and granted. Unknown resources are ignored.
    pub fn release_lock(&self, transaction_id: TransactionId, resource_id: ResourceId, mode: LockMode) {
        let mut table = self.table.lock();
        self.release_locked(&mut table, transaction_id, resource_id, mode);
    }

    fn release_locked(
        &self,
        table: &mut LockTable,
        transaction_id: TransactionId,
        resource_id: ResourceId,
        mode: LockMode,
    ) {
        let Some(entry) = table.resources.get_mut(&resource_id) else {
            return;
        };

        let promoted = entry.release(mode);
        table.unregister(transaction_id, resource_id, mode);
        self.stats.record_release();
        debug!(%transaction_id, %resource_id, %mode, "lock released");

        if let Some(request) = promoted {
            table.register(request.transaction_id, resource_id, request.mode);
            request.signal.grant();
            self.stats.record_promotion();
            debug!(
                transaction_id = %request.transaction_id,
                %resource_id,
                mode = %request.mode,
                "queued lock granted"
            );
        }
    }

    /// Releases every lock recorded for `transaction_id`.
    ///
    /// Several grants on one resource are each released. Returns the number
    /// of grants released.
    pub fn release_all(&self, transaction_id: TransactionId) -> usize {
        let mut table = self.table.lock();
        let held: Vec<(ResourceId, LockMode)> = table
            .transactions
            .get(&transaction_id)
            .map(|entry| entry.grants().collect())
            .unwrap_or_default();

        for (resource_id, mode) in &held {
            self.release_locked(&mut table, transaction_id, *resource_id, *mode);
        }
        held.len()
    }

    /// Aborts wait queues whose head has waited past the configured timeout.
    ///
    /// Only resources that queued a request are examined. A timed-out queue
    /// is cleared as a whole and each dropped waiter resolves to aborted.
    /// Resources that still have younger waiters stay on the worklist for
    /// the next sweep.
    ///
    /// This is a stall heuristic. It does not inspect wait-for edges across
    /// resources.
    pub fn detect_deadlocks(&self) -> DetectionReport {
        let mut guard = self.table.lock();
        let table = &mut *guard;
        let now = Instant::now();
        let timeout = self.config.deadlock_timeout;

        let pending: BTreeSet<ResourceId> = table.worklist.drain(..).collect();
        let mut report = DetectionReport {
            scanned: pending.len(),
            aborted: Vec::new(),
        };

        for resource_id in pending {
            let Some(entry) = table.resources.get_mut(&resource_id) else {
                continue;
            };

            if !entry.head_waited_longer_than(timeout, now) {
                let still_waiting = entry.has_waiters();
                if still_waiting {
                    table.worklist.push(resource_id);
                }
                continue;
            }

            let dropped = entry.abort_waiting();
            for request in &dropped {
                request.signal.abort();
            }
            self.stats.record_aborted(dropped.len() as u64);
            warn!(%resource_id, waiters = dropped.len(), "deadlock detected, wait queue aborted");

            report.aborted.push(AbortedQueue {
                resource_id,
                transactions: dropped.iter().map(|r| r.transaction_id).collect(),
            });
        }

        self.stats.record_sweep();
        debug!(
            scanned = report.scanned,
            aborted = report.aborted.len(),
            "deadlock detection completed"
        );
        report
    }

    /// Returns the grants recorded for a transaction, one item per grant.
    pub fn transaction_locks(&self, transaction_id: TransactionId) -> Vec<(ResourceId, LockMode)> {
        let table = self.table.lock();
        let mut locks: Vec<_> = table
            .transactions
            .get(&transaction_id)
            .map(|entry| entry.grants().collect())
            .unwrap_or_default();
        locks.sort();
        locks
    }

    /// Returns the granted modes and their counts on a resource.
    pub fn granted_modes(&self, resource_id: ResourceId) -> Vec<(LockMode, usize)> {
        self.table
            .lock()
            .resources
            .get(&resource_id)
            .map(LockEntry::granted)
            .unwrap_or_default()
    }

    /// Returns the number of queued requests on a resource.
    pub fn queue_len(&self, resource_id: ResourceId) -> usize {
        self.table
            .lock()
            .resources
            .get(&resource_id)
            .map_or(0, LockEntry::queue_len)
    }

    /// Returns the number of resources ever referenced.
    pub fn resource_count(&self) -> usize {
        self.table.lock().resources.len()
    }

    /// Returns the number of transactions currently holding locks.
    pub fn transaction_count(&self) -> usize {
        self.table.lock().transactions.len()
    }

    /// Returns the lock manager counters.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("resource_count", &self.resource_count())
            .field("transaction_count", &self.transaction_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::WaitStatus;
    use std::thread;
    use std::time::Duration;

    fn txn(id: i64) -> TransactionId {
        TransactionId::new(id)
    }

    fn res(id: u64) -> ResourceId {
        ResourceId::new(id)
    }

    #[test]
    fn acquire_on_empty_resource_grants_every_mode() {
        for (i, mode) in LockMode::ALL.into_iter().enumerate() {
            let lm = LockManager::new();
            let t = txn(i as i64);
            assert!(lm.acquire_lock(t, res(1), mode).is_granted());
            assert_eq!(lm.transaction_locks(t), vec![(res(1), mode)]);
        }
    }

    #[test]
    fn exclusive_holder_queues_everything() {
        let lm = LockManager::new();
        assert!(lm.acquire_lock(txn(1), res(1), LockMode::X).is_granted());

        for (i, mode) in LockMode::ALL.into_iter().enumerate() {
            let result = lm.acquire_lock(txn(10 + i as i64), res(1), mode);
            assert!(!result.is_granted(), "{mode} should queue");
        }
        assert_eq!(lm.queue_len(res(1)), 6);
        assert_eq!(lm.stats().waits(), 6);
    }

    #[test]
    fn compatible_modes_share_resource() {
        let lm = LockManager::new();
        assert!(lm.acquire_lock(txn(1), res(1), LockMode::IS).is_granted());
        assert!(lm.acquire_lock(txn(2), res(1), LockMode::S).is_granted());
        assert!(lm.acquire_lock(txn(3), res(1), LockMode::IS).is_granted());
        assert_eq!(
            lm.granted_modes(res(1)),
            vec![(LockMode::IS, 2), (LockMode::S, 1)]
        );
    }

    #[test]
    fn release_promotes_exactly_one_waiter() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(1), res(1), LockMode::X);
        let w2 = lm.acquire_lock(txn(2), res(1), LockMode::S).into_waiter().unwrap();
        let w3 = lm.acquire_lock(txn(3), res(1), LockMode::S).into_waiter().unwrap();

        lm.release_lock(txn(1), res(1), LockMode::X);

        assert_eq!(w2.status(), WaitStatus::Granted);
        assert_eq!(w3.status(), WaitStatus::Waiting);
        assert_eq!(lm.queue_len(res(1)), 1);
        assert_eq!(lm.transaction_locks(txn(2)), vec![(res(1), LockMode::S)]);
        assert!(lm.transaction_locks(txn(1)).is_empty());
    }

    #[test]
    fn shared_waiter_granted_before_exclusive_waiter() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(9), res(1), LockMode::X);
        let w1 = lm.acquire_lock(txn(1), res(1), LockMode::S).into_waiter().unwrap();
        let w2 = lm.acquire_lock(txn(2), res(1), LockMode::X).into_waiter().unwrap();

        lm.release_lock(txn(9), res(1), LockMode::X);
        assert_eq!(w1.status(), WaitStatus::Granted);
        assert_eq!(w2.status(), WaitStatus::Waiting);

        lm.release_lock(txn(1), res(1), LockMode::S);
        assert_eq!(w2.status(), WaitStatus::Granted);
        assert_eq!(lm.granted_modes(res(1)), vec![(LockMode::X, 1)]);
    }

    #[test]
    fn release_unknown_resource_is_noop() {
        let lm = LockManager::new();
        lm.release_lock(txn(1), res(99), LockMode::X);
        assert_eq!(lm.resource_count(), 0);
        assert_eq!(lm.stats().releases(), 0);
    }

    #[test]
    fn release_all_frees_every_resource() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(1), res(1), LockMode::IX);
        lm.acquire_lock(txn(1), res(2), LockMode::X);
        let waiter = lm.acquire_lock(txn(2), res(2), LockMode::S).into_waiter().unwrap();

        assert_eq!(lm.release_all(txn(1)), 2);
        assert!(lm.transaction_locks(txn(1)).is_empty());
        assert_eq!(waiter.status(), WaitStatus::Granted);
        assert!(lm.granted_modes(res(1)).is_empty());
    }

    #[test]
    fn release_all_frees_every_grant_on_one_resource() {
        let lm = LockManager::new();
        assert!(lm.acquire_lock(txn(1), res(1), LockMode::S).is_granted());
        assert!(lm.acquire_lock(txn(1), res(1), LockMode::IS).is_granted());
        assert_eq!(
            lm.transaction_locks(txn(1)),
            vec![(res(1), LockMode::IS), (res(1), LockMode::S)]
        );
        let writer = lm.acquire_lock(txn(2), res(1), LockMode::X).into_waiter().unwrap();

        assert_eq!(lm.release_all(txn(1)), 2);
        assert_eq!(writer.status(), WaitStatus::Granted);
        assert_eq!(lm.granted_modes(res(1)), vec![(LockMode::X, 1)]);
        assert_eq!(lm.transaction_count(), 1);
    }

    #[test]
    fn transaction_entry_dropped_after_last_release() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(1), res(1), LockMode::S);
        assert_eq!(lm.transaction_count(), 1);
        lm.release_lock(txn(1), res(1), LockMode::S);
        assert_eq!(lm.transaction_count(), 0);
        // The resource entry itself is never destroyed.
        assert_eq!(lm.resource_count(), 1);
    }

    #[test]
    fn detect_aborts_stale_queue() {
        let lm = LockManager::with_config(
            LockManagerConfig::new().deadlock_timeout(Duration::from_millis(20)),
        );
        lm.acquire_lock(txn(1), res(1), LockMode::X);
        let w2 = lm.acquire_lock(txn(2), res(1), LockMode::X).into_waiter().unwrap();
        let w3 = lm.acquire_lock(txn(3), res(1), LockMode::S).into_waiter().unwrap();

        thread::sleep(Duration::from_millis(40));
        let report = lm.detect_deadlocks();

        assert_eq!(report.aborted.len(), 1);
        assert_eq!(report.aborted[0].transactions, vec![txn(2), txn(3)]);
        assert_eq!(lm.queue_len(res(1)), 0);
        assert!(w2.wait().unwrap_err().is_aborted());
        assert_eq!(w3.status(), WaitStatus::Aborted);
        // The holder keeps its grant.
        assert_eq!(lm.granted_modes(res(1)), vec![(LockMode::X, 1)]);
    }

    #[test]
    fn detect_leaves_young_queue() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(1), res(1), LockMode::X);
        let waiter = lm.acquire_lock(txn(2), res(1), LockMode::S).into_waiter().unwrap();

        let report = lm.detect_deadlocks();
        assert!(report.aborted.is_empty());
        assert_eq!(report.scanned, 1);
        assert_eq!(waiter.status(), WaitStatus::Waiting);
        assert_eq!(lm.queue_len(res(1)), 1);
    }

    #[test]
    fn young_queue_is_rechecked_on_later_sweep() {
        let lm = LockManager::with_config(
            LockManagerConfig::new().deadlock_timeout(Duration::from_millis(20)),
        );
        lm.acquire_lock(txn(1), res(1), LockMode::X);
        let waiter = lm.acquire_lock(txn(2), res(1), LockMode::X).into_waiter().unwrap();

        assert!(lm.detect_deadlocks().aborted.is_empty());
        thread::sleep(Duration::from_millis(40));
        let report = lm.detect_deadlocks();

        assert_eq!(report.aborted_waiters(), 1);
        assert_eq!(waiter.status(), WaitStatus::Aborted);
    }

    #[test]
    fn drained_queue_leaves_worklist() {
        let lm = LockManager::new();
        lm.acquire_lock(txn(1), res(1), LockMode::X);
        lm.acquire_lock(txn(2), res(1), LockMode::X);
        lm.release_lock(txn(1), res(1), LockMode::X);

        assert_eq!(lm.detect_deadlocks().scanned, 1);
        assert_eq!(lm.detect_deadlocks().scanned, 0);
    }

    #[test]
    fn queued_waiter_unblocks_across_threads() {
        let lm = std::sync::Arc::new(LockManager::new());
        lm.acquire_lock(txn(1), res(5), LockMode::X);
        let waiter = lm.acquire_lock(txn(2), res(5), LockMode::X).into_waiter().unwrap();

        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(10));
        lm.release_lock(txn(1), res(5), LockMode::X);

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(lm.transaction_locks(txn(2)), vec![(res(5), LockMode::X)]);
    }
}
