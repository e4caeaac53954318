//! Multi-granularity locking.
//!
//! The lock manager tracks, per resource, the multiset of granted modes and
//! a FIFO queue of blocked requests. Each transaction's held locks are kept
//! in a [`TransactionEntry`] for inspection and bulk release.
//!
//! - A request is granted only if it is compatible with every granted mode
//!   and nobody is queued ahead of it.
//! - Each release promotes at most the queue head.
//! - Queued callers observe their fate through a [`LockWaiter`].

mod entry;
mod manager;
mod mode;
mod transaction;
mod waiter;

pub use manager::{AbortedQueue, Acquire, DetectionReport, LockManager};
pub use mode::{LockMode, ParseLockModeError};
pub use transaction::TransactionEntry;
pub use waiter::{LockWaiter, WaitStatus};
