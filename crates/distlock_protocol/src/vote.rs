//! Participant vote carried in a prepare response.
//!
//! ```text
//! ┌──────────┬──────────────────────────────┐
//! │ vote 0|1 │ UTF-8 message (rest)         │
//! └──────────┴──────────────────────────────┘
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// A participant's answer to a prepare request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteResult {
    vote: bool,
    message: String,
}

impl VoteResult {
    /// A "yes" vote.
    pub fn yes(message: impl Into<String>) -> Self {
        Self {
            vote: true,
            message: message.into(),
        }
    }

    /// A "no" vote.
    pub fn no(message: impl Into<String>) -> Self {
        Self {
            vote: false,
            message: message.into(),
        }
    }

    /// Returns true for a "yes" vote.
    pub fn vote(&self) -> bool {
        self.vote
    }

    /// Returns the advisory message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Encodes the response payload.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.message.len());
        buf.put_u8(u8::from(self.vote));
        buf.put_slice(self.message.as_bytes());
        buf.freeze()
    }

    /// Decodes a full response payload.
    ///
    /// Only a leading `1` counts as yes. Invalid UTF-8 in the message is
    /// replaced rather than rejected.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let (&vote, message) = bytes.split_first().ok_or(ProtocolError::EmptyResponse)?;
        Ok(Self {
            vote: vote == 1,
            message: String::from_utf8_lossy(message).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ok_yes() {
        let vote = VoteResult::decode(&[1, b'O', b'K']).unwrap();
        assert!(vote.vote());
        assert_eq!(vote.message(), "OK");
    }

    #[test]
    fn decode_no_with_empty_message() {
        let vote = VoteResult::decode(&[0]).unwrap();
        assert!(!vote.vote());
        assert_eq!(vote.message(), "");
    }

    #[test]
    fn non_one_vote_byte_is_no() {
        assert!(!VoteResult::decode(&[2, b'x']).unwrap().vote());
    }

    #[test]
    fn empty_response_rejected() {
        assert_eq!(VoteResult::decode(&[]), Err(ProtocolError::EmptyResponse));
    }

    #[test]
    fn encode_yes() {
        let bytes = VoteResult::yes("Ready to commit").encode();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..], b"Ready to commit");
        assert_eq!(VoteResult::decode(&bytes).unwrap(), VoteResult::yes("Ready to commit"));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let vote = VoteResult::decode(&[1, 0xff, b'a']).unwrap();
        assert_eq!(vote.message(), "\u{fffd}a");
    }
}
