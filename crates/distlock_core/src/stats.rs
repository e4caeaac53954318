//! Lock manager counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock manager statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Requests granted on arrival.
    acquisitions: AtomicU64,
    /// Requests that had to queue.
    waits: AtomicU64,
    /// Release calls.
    releases: AtomicU64,
    /// Queued requests granted by a release.
    promotions: AtomicU64,
    /// Queued requests dropped by the stall detector.
    aborted_waiters: AtomicU64,
    /// Detector sweeps run.
    sweeps: AtomicU64,
}

/// Point-in-time copy of [`LockStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LockStatsSnapshot {
    /// Requests granted on arrival.
    pub acquisitions: u64,
    /// Requests that had to queue.
    pub waits: u64,
    /// Release calls.
    pub releases: u64,
    /// Queued requests granted by a release.
    pub promotions: u64,
    /// Queued requests dropped by the stall detector.
    pub aborted_waiters: u64,
    /// Detector sweeps run.
    pub sweeps: u64,
}

impl LockStats {
    /// Creates zeroed stats.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquisition(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wait(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted(&self, count: u64) {
        self.aborted_waiters.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns requests granted on arrival.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Returns requests that had to queue.
    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    /// Returns release calls.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Returns queued requests granted by a release.
    pub fn promotions(&self) -> u64 {
        self.promotions.load(Ordering::Relaxed)
    }

    /// Returns queued requests dropped by the stall detector.
    pub fn aborted_waiters(&self) -> u64 {
        self.aborted_waiters.load(Ordering::Relaxed)
    }

    /// Returns detector sweeps run.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    /// Takes a snapshot of all counters.
    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            acquisitions: self.acquisitions(),
            waits: self.waits(),
            releases: self.releases(),
            promotions: self.promotions(),
            aborted_waiters: self.aborted_waiters(),
            sweeps: self.sweeps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = LockStats::new();
        stats.record_acquisition();
        stats.record_wait();
        stats.record_wait();
        stats.record_aborted(3);

        let snap = stats.snapshot();
        assert_eq!(snap.acquisitions, 1);
        assert_eq!(snap.waits, 2);
        assert_eq!(snap.aborted_waiters, 3);
        assert_eq!(snap.sweeps, 0);
    }
}
