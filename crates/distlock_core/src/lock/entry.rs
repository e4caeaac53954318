//! Per-resource lock state.

use crate::lock::waiter::WaitSignal;
use crate::lock::LockMode;
use crate::types::TransactionId;
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// A lock request parked in a resource's wait queue.
#[derive(Debug, Clone)]
pub(crate) struct LockRequest {
    /// Transaction requesting the lock.
    pub transaction_id: TransactionId,
    /// Requested mode.
    pub mode: LockMode,
    /// When the request was enqueued.
    pub enqueued_at: Instant,
    /// Resolves the caller's waiter.
    pub signal: WaitSignal,
}

/// Lock state of a single resource: granted-mode counts plus a FIFO wait queue.
///
/// A mode with count zero is never present in `granted`.
#[derive(Debug, Default)]
pub(crate) struct LockEntry {
    granted: BTreeMap<LockMode, usize>,
    queue: VecDeque<LockRequest>,
}

impl LockEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `mode` is compatible with every granted mode.
    pub fn can_grant(&self, mode: LockMode) -> bool {
        self.granted.keys().all(|granted| granted.permits(mode))
    }

    /// Returns true if a fresh request may be granted without queueing.
    ///
    /// Newcomers never overtake queued requests.
    pub fn can_grant_immediately(&self, mode: LockMode) -> bool {
        self.queue.is_empty() && self.can_grant(mode)
    }

    pub fn grant(&mut self, mode: LockMode) {
        *self.granted.entry(mode).or_insert(0) += 1;
    }

    /// Drops one grant of `mode` and promotes the queue head if it now fits.
    ///
    /// At most one waiter is promoted per call.
    pub fn release(&mut self, mode: LockMode) -> Option<LockRequest> {
        if let Some(count) = self.granted.get_mut(&mode) {
            *count -= 1;
            if *count == 0 {
                self.granted.remove(&mode);
            }
        }

        let head_mode = self.queue.front()?.mode;
        if !self.can_grant(head_mode) {
            return None;
        }

        let request = self.queue.pop_front()?;
        self.grant(request.mode);
        Some(request)
    }

    pub fn enqueue(&mut self, request: LockRequest) {
        self.queue.push_back(request);
    }

    /// Returns true if the head request has waited longer than `timeout`.
    pub fn head_waited_longer_than(&self, timeout: Duration, now: Instant) -> bool {
        self.queue
            .front()
            .is_some_and(|head| now.saturating_duration_since(head.enqueued_at) > timeout)
    }

    /// Clears the whole wait queue, returning the dropped requests.
    pub fn abort_waiting(&mut self) -> Vec<LockRequest> {
        self.queue.drain(..).collect()
    }

    pub fn has_waiters(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns the granted modes with their counts, in mode order.
    pub fn granted(&self) -> Vec<(LockMode, usize)> {
        self.granted.iter().map(|(mode, count)| (*mode, *count)).collect()
    }
}
