//! Error types for distlock core.

use crate::lock::LockMode;
use crate::types::{ResourceId, TransactionId};
use std::time::Duration;
use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors observed by a caller waiting on a queued lock request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The wait queue was cleared by the stall detector.
    #[error("lock wait aborted: {transaction_id} waiting for {mode} on {resource_id}")]
    Aborted {
        /// Transaction whose request was dropped.
        transaction_id: TransactionId,
        /// Resource the request was queued on.
        resource_id: ResourceId,
        /// Requested mode.
        mode: LockMode,
    },

    /// The caller's own wait deadline passed; the request is still queued.
    #[error("lock wait timed out after {waited:?} on {resource_id}")]
    WaitTimedOut {
        /// Resource the request is queued on.
        resource_id: ResourceId,
        /// How long the caller waited.
        waited: Duration,
    },
}

impl LockError {
    /// Returns true if the request is gone from the queue.
    pub fn is_aborted(&self) -> bool {
        matches!(self, LockError::Aborted { .. })
    }
}
