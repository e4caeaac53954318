//! End-to-end lock manager scenarios.

use distlock_core::{
    LockManager, LockManagerConfig, LockMode, ResourceId, TransactionId, WaitStatus,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn txn(id: i64) -> TransactionId {
    TransactionId::new(id)
}

#[test]
fn resource_seven_scenario() {
    let lm = LockManager::new();
    let r7 = ResourceId::new(7);

    assert!(lm.acquire_lock(txn(1), r7, LockMode::S).is_granted());
    let t2 = lm.acquire_lock(txn(2), r7, LockMode::X).into_waiter().unwrap();
    let t3 = lm.acquire_lock(txn(3), r7, LockMode::S).into_waiter().unwrap();

    lm.release_lock(txn(1), r7, LockMode::S);
    assert_eq!(t2.status(), WaitStatus::Granted);
    assert_eq!(t3.status(), WaitStatus::Waiting);

    lm.release_lock(txn(2), r7, LockMode::X);
    assert_eq!(t3.status(), WaitStatus::Granted);
    assert_eq!(lm.granted_modes(r7), vec![(LockMode::S, 1)]);
    assert_eq!(lm.queue_len(r7), 0);
}

#[test]
fn stale_queue_cleared_but_young_queue_kept() {
    let lm = LockManager::with_config(
        LockManagerConfig::new().deadlock_timeout(Duration::from_millis(30)),
    );
    let old = ResourceId::new(1);
    let young = ResourceId::new(2);

    lm.acquire_lock(txn(1), old, LockMode::X);
    let stale = lm.acquire_lock(txn(2), old, LockMode::X).into_waiter().unwrap();
    thread::sleep(Duration::from_millis(60));

    lm.acquire_lock(txn(3), young, LockMode::X);
    let fresh = lm.acquire_lock(txn(4), young, LockMode::S).into_waiter().unwrap();

    let report = lm.detect_deadlocks();
    assert_eq!(report.aborted.len(), 1);
    assert_eq!(report.aborted[0].resource_id, old);
    assert_eq!(stale.status(), WaitStatus::Aborted);
    assert_eq!(fresh.status(), WaitStatus::Waiting);
    assert_eq!(lm.queue_len(young), 1);
}

#[test]
fn contended_resource_serves_every_worker() {
    let lm = Arc::new(LockManager::new());
    let resource = ResourceId::new(11);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let lm = Arc::clone(&lm);
            thread::spawn(move || {
                let t = txn(i);
                if let Some(waiter) = lm.acquire_lock(t, resource, LockMode::X).into_waiter() {
                    waiter.wait().unwrap();
                }
                thread::sleep(Duration::from_millis(1));
                lm.release_lock(t, resource, LockMode::X);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(lm.granted_modes(resource).is_empty());
    assert_eq!(lm.queue_len(resource), 0);
    assert_eq!(lm.stats().releases(), 8);
    assert_eq!(lm.transaction_count(), 0);
}

fn mode_strategy() -> impl Strategy<Value = LockMode> {
    (0u8..6).prop_map(|v| LockMode::from_u8(v).unwrap())
}

proptest! {
    #[test]
    fn grant_requires_every_granted_mode_to_permit(
        granted in prop::collection::vec(mode_strategy(), 0..5),
        requested in mode_strategy(),
    ) {
        let lm = LockManager::new();
        let resource = ResourceId::new(1);
        let mut held = Vec::new();
        for (i, mode) in granted.iter().enumerate() {
            if lm.acquire_lock(txn(i as i64), resource, *mode).is_granted() {
                held.push(*mode);
            } else {
                // Once something queues, later requests queue too.
                break;
            }
        }
        if lm.queue_len(resource) == 0 {
            let expected = held.iter().all(|g| g.permits(requested));
            let result = lm.acquire_lock(txn(100), resource, requested);
            prop_assert_eq!(result.is_granted(), expected);
        }
    }

    #[test]
    fn waiters_are_granted_in_arrival_order(count in 1usize..8) {
        let lm = LockManager::new();
        let resource = ResourceId::new(3);
        lm.acquire_lock(txn(0), resource, LockMode::X);

        let waiters: Vec<_> = (1..=count as i64)
            .map(|i| lm.acquire_lock(txn(i), resource, LockMode::X).into_waiter().unwrap())
            .collect();

        let mut holder = txn(0);
        for waiter in &waiters {
            lm.release_lock(holder, resource, LockMode::X);
            prop_assert_eq!(waiter.status(), WaitStatus::Granted);
            holder = waiter.transaction_id();
        }
        prop_assert_eq!(lm.queue_len(resource), 0);
    }
}
