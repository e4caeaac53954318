//! Per-transaction lock registry.

use crate::lock::LockMode;
use crate::types::ResourceId;
use std::collections::HashMap;

/// Locks currently held by one transaction.
///
/// Used for bookkeeping and bulk release. A transaction may hold several
/// grants on one resource (say S and then IS); each is kept so a bulk
/// release frees every one of them. [`mode`](Self::mode) reports the most
/// recent grant.
#[derive(Debug, Default, Clone)]
pub struct TransactionEntry {
    locks: HashMap<ResourceId, Vec<LockMode>>,
}

impl TransactionEntry {
    /// Creates an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a held lock.
    pub fn add_lock(&mut self, resource_id: ResourceId, mode: LockMode) {
        self.locks.entry(resource_id).or_default().push(mode);
    }

    /// Forgets one grant of `mode` on `resource_id`.
    ///
    /// Returns `None`, leaving the entry unchanged, if no such grant is
    /// recorded.
    pub fn remove_lock(&mut self, resource_id: ResourceId, mode: LockMode) -> Option<LockMode> {
        let modes = self.locks.get_mut(&resource_id)?;
        let index = modes.iter().rposition(|m| *m == mode)?;
        modes.remove(index);
        if modes.is_empty() {
            self.locks.remove(&resource_id);
        }
        Some(mode)
    }

    /// Returns the most recently granted mode on `resource_id`.
    #[must_use]
    pub fn mode(&self, resource_id: ResourceId) -> Option<LockMode> {
        self.locks.get(&resource_id).and_then(|modes| modes.last().copied())
    }

    /// Iterates over held resources with their most recent mode.
    pub fn locks(&self) -> impl Iterator<Item = (ResourceId, LockMode)> + '_ {
        self.locks
            .iter()
            .filter_map(|(resource, modes)| modes.last().map(|mode| (*resource, *mode)))
    }

    /// Iterates over every recorded grant, one item per grant.
    pub fn grants(&self) -> impl Iterator<Item = (ResourceId, LockMode)> + '_ {
        self.locks
            .iter()
            .flat_map(|(resource, modes)| modes.iter().map(move |mode| (*resource, *mode)))
    }

    /// Returns the number of resources with at least one grant.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no locks are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
