//! Benchmark utilities.

use distlock_core::{LockManager, LockMode, ResourceId, TransactionId};

/// Grants `holders` shared locks on each of `resources` resources.
pub fn populate(manager: &LockManager, resources: u64, holders: i64) {
    for r in 0..resources {
        for t in 0..holders {
            manager.acquire_lock(TransactionId::new(t), ResourceId::new(r), LockMode::IS);
        }
    }
}

/// Queues `waiters` exclusive requests behind an exclusive holder on `resource`.
pub fn contend(manager: &LockManager, resource: ResourceId, waiters: i64) {
    manager.acquire_lock(TransactionId::new(-1), resource, LockMode::X);
    for t in 0..waiters {
        manager.acquire_lock(TransactionId::new(t), resource, LockMode::X);
    }
}
