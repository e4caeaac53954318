//! Participant server error types.

use distlock_protocol::ProtocolError;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for the participant server.
pub type ParticipantResult<T> = Result<T, ParticipantError>;

/// Errors from the participant server.
#[derive(Error, Debug)]
pub enum ParticipantError {
    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O on a connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection sat idle past the configured timeout.
    #[error("connection idle for too long")]
    IdleTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_address() {
        let err = ParticipantError::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
