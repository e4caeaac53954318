//! Participant server configuration.

use crate::error::{ParticipantError, ParticipantResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default participant port.
pub const DEFAULT_PORT: u16 = 12345;

/// Largest accepted `max_connections`.
pub const MAX_CONNECTIONS: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Configuration for a [`ParticipantServer`](crate::ParticipantServer).
#[derive(Debug, Clone)]
pub struct ParticipantConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections, between 1 and [`MAX_CONNECTIONS`].
    pub max_connections: usize,
    /// How long a connection may sit idle between requests. `None` waits
    /// indefinitely, which suits coordinators that connect participants
    /// well before committing.
    pub idle_timeout: Option<Duration>,
}

impl ParticipantConfig {
    /// Creates a configuration bound to `bind_addr`.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            idle_timeout: None,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Closes connections that stay idle longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Checks the configuration before a server is built from it.
    pub fn validate(&self) -> ParticipantResult<()> {
        if !(1..=MAX_CONNECTIONS).contains(&self.max_connections) {
            return Err(ParticipantError::InvalidConfig(format!(
                "max_connections must be between 1 and {MAX_CONNECTIONS}, got {}",
                self.max_connections
            )));
        }
        Ok(())
    }
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}
