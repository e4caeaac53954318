//! Periodic stall detection.
//!
//! ```rust,ignore
//! let manager = Arc::new(LockManager::new());
//! let detector = DeadlockDetector::spawn(Arc::clone(&manager), Duration::from_millis(50))?;
//! // ... acquire / release from worker threads ...
//! detector.stop();
//! ```

use crate::lock::LockManager;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Background thread that sweeps a [`LockManager`] on a fixed interval.
///
/// The first sweep runs immediately. The thread stops when [`stop`](Self::stop)
/// is called or the detector is dropped.
#[derive(Debug)]
pub struct DeadlockDetector {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DeadlockDetector {
    /// Starts sweeping `manager` every `interval`.
    pub fn spawn(manager: Arc<LockManager>, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("distlock-detector".into())
            .spawn(move || {
                debug!(?interval, "deadlock detector started");
                loop {
                    manager.detect_deadlocks();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("deadlock detector stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Starts sweeping with the manager's configured interval.
    pub fn spawn_configured(manager: Arc<LockManager>) -> io::Result<Self> {
        let interval = manager.config().detection_interval;
        Self::spawn(manager, interval)
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the thread.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeadlockDetector {
    fn drop(&mut self) {
        self.shutdown();
    }
}
