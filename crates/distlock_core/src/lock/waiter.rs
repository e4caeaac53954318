//! Completion handles for queued lock requests.

use crate::error::{LockError, LockResult};
use crate::lock::LockMode;
use crate::types::{ResourceId, TransactionId};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status of a queued lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Still in the resource's wait queue.
    Waiting,
    /// Dequeued and granted by a release.
    Granted,
    /// Dropped when the stall detector cleared the queue.
    Aborted,
}

#[derive(Debug)]
struct Slot {
    status: Mutex<WaitStatus>,
    changed: Condvar,
}

/// Resolving side of a waiter, kept in the wait queue.
#[derive(Debug, Clone)]
pub(crate) struct WaitSignal {
    slot: Arc<Slot>,
}

impl WaitSignal {
    pub(crate) fn grant(&self) {
        self.resolve(WaitStatus::Granted);
    }

    pub(crate) fn abort(&self) {
        self.resolve(WaitStatus::Aborted);
    }

    fn resolve(&self, outcome: WaitStatus) {
        let mut status = self.slot.status.lock();
        if *status == WaitStatus::Waiting {
            *status = outcome;
            self.slot.changed.notify_all();
        }
    }
}

/// Handle returned to a caller whose lock request was queued.
///
/// The lock manager resolves it exactly once: to [`WaitStatus::Granted`]
/// when a release promotes the request, or to [`WaitStatus::Aborted`] when
/// the stall detector clears the queue. Dropping the handle does not
/// withdraw the request.
#[derive(Debug, Clone)]
pub struct LockWaiter {
    transaction_id: TransactionId,
    resource_id: ResourceId,
    mode: LockMode,
    slot: Arc<Slot>,
}

impl LockWaiter {
    pub(crate) fn new(
        transaction_id: TransactionId,
        resource_id: ResourceId,
        mode: LockMode,
    ) -> (Self, WaitSignal) {
        let slot = Arc::new(Slot {
            status: Mutex::new(WaitStatus::Waiting),
            changed: Condvar::new(),
        });
        let signal = WaitSignal {
            slot: Arc::clone(&slot),
        };
        let waiter = Self {
            transaction_id,
            resource_id,
            mode,
            slot,
        };
        (waiter, signal)
    }

    /// Returns the waiting transaction.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Returns the resource the request is queued on.
    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    /// Returns the requested mode.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Returns the current status without blocking.
    pub fn status(&self) -> WaitStatus {
        *self.slot.status.lock()
    }

    /// Blocks until the request is granted or aborted.
    pub fn wait(&self) -> LockResult<()> {
        let mut status = self.slot.status.lock();
        while *status == WaitStatus::Waiting {
            self.slot.changed.wait(&mut status);
        }
        self.outcome(*status, Duration::ZERO)
    }

    /// Blocks until the request resolves or `timeout` elapses.
    ///
    /// On timeout the request stays queued and may still be granted later.
    pub fn wait_timeout(&self, timeout: Duration) -> LockResult<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut status = self.slot.status.lock();
        while *status == WaitStatus::Waiting {
            if self
                .slot
                .changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                break;
            }
        }
        self.outcome(*status, start.elapsed())
    }

    fn outcome(&self, status: WaitStatus, waited: Duration) -> LockResult<()> {
        match status {
            WaitStatus::Granted => Ok(()),
            WaitStatus::Aborted => Err(LockError::Aborted {
                transaction_id: self.transaction_id,
                resource_id: self.resource_id,
                mode: self.mode,
            }),
            WaitStatus::Waiting => Err(LockError::WaitTimedOut {
                resource_id: self.resource_id,
                waited,
            }),
        }
    }
}
