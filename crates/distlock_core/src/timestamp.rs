//! Logical timestamp assignment.

use crate::types::TransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Hands out a strictly increasing logical timestamp per transaction.
///
/// Nothing in the lock manager or coordinator orders by these values; they
/// are bookkeeping for callers.
#[derive(Debug, Default)]
pub struct TimestampAssigner {
    counter: AtomicU64,
    timestamps: RwLock<HashMap<TransactionId, u64>>,
}

impl TimestampAssigner {
    /// Creates an assigner whose first timestamp is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next timestamp to `transaction_id` and returns it.
    ///
    /// Re-assigning replaces the previous value.
    pub fn assign_timestamp(&self, transaction_id: TransactionId) -> u64 {
        let timestamp = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.timestamps.write().insert(transaction_id, timestamp);
        debug!(%transaction_id, timestamp, "timestamp assigned");
        timestamp
    }

    /// Forgets the timestamp of `transaction_id`.
    pub fn remove_timestamp(&self, transaction_id: TransactionId) -> Option<u64> {
        self.timestamps.write().remove(&transaction_id)
    }

    /// Returns the timestamp assigned to `transaction_id`.
    pub fn timestamp(&self, transaction_id: TransactionId) -> Option<u64> {
        self.timestamps.read().get(&transaction_id).copied()
    }

    /// Returns the number of transactions holding a timestamp.
    pub fn len(&self) -> usize {
        self.timestamps.read().len()
    }

    /// Returns true if no transaction holds a timestamp.
    pub fn is_empty(&self) -> bool {
        self.timestamps.read().is_empty()
    }
}
