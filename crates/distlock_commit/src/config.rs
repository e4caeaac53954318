//! Configuration for participant connections.

use std::time::Duration;

/// Configuration for a [`TcpCommunicationManager`](crate::TcpCommunicationManager).
#[derive(Debug, Clone)]
pub struct CommunicationConfig {
    /// Connect timeout. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Read timeout while waiting for a vote. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Write timeout. `None` blocks indefinitely.
    pub write_timeout: Option<Duration>,
    /// Whether to disable Nagle's algorithm on new connections.
    pub nodelay: bool,
    /// Initial capacity of the prepare response buffer; it grows as needed.
    pub response_buffer_size: usize,
}

impl CommunicationConfig {
    /// Creates a configuration with no timeouts.
    pub fn new() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
            response_buffer_size: 1024,
        }
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout for prepare responses.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets whether to disable Nagle's algorithm.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Sets the initial response buffer capacity.
    pub fn with_response_buffer_size(mut self, size: usize) -> Self {
        self.response_buffer_size = size;
        self
    }
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_timeouts() {
        let config = CommunicationConfig::default();
        assert!(config.read_timeout.is_none());
        assert!(config.connect_timeout.is_none());
        assert_eq!(config.response_buffer_size, 1024);
    }

    #[test]
    fn config_builder() {
        let config = CommunicationConfig::new()
            .with_connect_timeout(Duration::from_secs(1))
            .with_read_timeout(Duration::from_secs(5))
            .with_nodelay(false);

        assert_eq!(config.connect_timeout, Some(Duration::from_secs(1)));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(5)));
        assert!(!config.nodelay);
    }
}
