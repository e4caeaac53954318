//! Coordinator-to-participant request frames.
//!
//! Every request is exactly [`REQUEST_LEN`] bytes:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┐
//! │ message type │ transaction id (i64, LE)     │
//! │    1 byte    │           8 bytes            │
//! └──────────────┴──────────────────────────────┘
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use distlock_core::TransactionId;
use serde::Serialize;
use std::fmt;

/// Size of an encoded request frame.
pub const REQUEST_LEN: usize = 9;

/// Request message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MessageType {
    /// Ask the participant to vote.
    Prepare = 0,
    /// Tell the participant to commit.
    Commit = 1,
    /// Tell the participant to roll back.
    Rollback = 2,
}

impl MessageType {
    /// Returns the message type code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> ProtocolResult<Self> {
        match value {
            0 => Ok(MessageType::Prepare),
            1 => Ok(MessageType::Commit),
            2 => Ok(MessageType::Rollback),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Prepare => write!(f, "Prepare"),
            MessageType::Commit => write!(f, "Commit"),
            MessageType::Rollback => write!(f, "Rollback"),
        }
    }
}

/// A single coordinator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// What the participant should do.
    pub message_type: MessageType,
    /// Transaction the request is about.
    pub transaction_id: TransactionId,
}

impl Request {
    /// Creates a prepare request.
    pub fn prepare(transaction_id: TransactionId) -> Self {
        Self {
            message_type: MessageType::Prepare,
            transaction_id,
        }
    }

    /// Creates a commit request.
    pub fn commit(transaction_id: TransactionId) -> Self {
        Self {
            message_type: MessageType::Commit,
            transaction_id,
        }
    }

    /// Creates a rollback request.
    pub fn rollback(transaction_id: TransactionId) -> Self {
        Self {
            message_type: MessageType::Rollback,
            transaction_id,
        }
    }

    /// Encodes the request into its 9-byte frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REQUEST_LEN);
        buf.put_u8(self.message_type.code());
        buf.put_i64_le(self.transaction_id.as_i64());
        buf.freeze()
    }

    /// Decodes a request from the first [`REQUEST_LEN`] bytes of `bytes`.
    ///
    /// Trailing bytes are ignored.
    pub fn decode(mut bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() < REQUEST_LEN {
            return Err(ProtocolError::Truncated {
                expected: REQUEST_LEN,
                actual: bytes.len(),
            });
        }

        let message_type = MessageType::try_from(bytes.get_u8())?;
        let transaction_id = TransactionId::new(bytes.get_i64_le());
        Ok(Self {
            message_type,
            transaction_id,
        })
    }
}
