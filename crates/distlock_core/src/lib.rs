//! # distlock core
//!
//! Concurrency-control kernel for distlock.
//!
//! This crate provides:
//! - A multi-granularity lock manager (NL, IS, IX, S, SIX, X)
//! - FIFO wait queues with observable waiter completion
//! - A per-transaction lock registry for inspection and bulk release
//! - A timeout-based stall detector and its background sweeper
//! - A monotonic logical timestamp assigner
//!
//! ## Key Invariants
//!
//! - A request is granted only if compatible with every granted mode
//! - Wait queues are served strictly in arrival order
//! - Each release promotes at most one waiter
//! - All lock table mutation happens under a single gate

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod detector;
mod error;
mod lock;
mod stats;
mod timestamp;
mod types;

pub use config::{LockManagerConfig, DEFAULT_DEADLOCK_TIMEOUT};
pub use detector::DeadlockDetector;
pub use error::{LockError, LockResult};
pub use lock::{
    AbortedQueue, Acquire, DetectionReport, LockManager, LockMode, LockWaiter, ParseLockModeError,
    TransactionEntry, WaitStatus,
};
pub use stats::{LockStats, LockStatsSnapshot};
pub use timestamp::TimestampAssigner;
pub use types::{ParticipantId, ResourceId, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
