//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding protocol frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A request frame was shorter than its fixed size.
    #[error("truncated request: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Required length.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// The message type byte is not a known request.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A prepare response carried no bytes at all.
    #[error("empty prepare response")]
    EmptyResponse,
}
