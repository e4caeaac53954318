//! Lock manager configuration.

use std::time::Duration;

/// Default age after which a stalled wait queue is aborted.
pub const DEFAULT_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for a [`LockManager`](crate::LockManager).
#[derive(Debug, Clone)]
pub struct LockManagerConfig {
    /// How long the head of a wait queue may wait before the detector
    /// clears the whole queue.
    pub deadlock_timeout: Duration,

    /// How often a [`DeadlockDetector`](crate::DeadlockDetector) sweeps.
    pub detection_interval: Duration,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            deadlock_timeout: DEFAULT_DEADLOCK_TIMEOUT,
            detection_interval: Duration::from_millis(50),
        }
    }
}

impl LockManagerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stall timeout.
    #[must_use]
    pub const fn deadlock_timeout(mut self, timeout: Duration) -> Self {
        self.deadlock_timeout = timeout;
        self
    }

    /// Sets the detector sweep interval.
    #[must_use]
    pub const fn detection_interval(mut self, interval: Duration) -> Self {
        self.detection_interval = interval;
        self
    }
}
