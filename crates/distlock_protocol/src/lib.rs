//! # distlock protocol
//!
//! Binary wire protocol between a two-phase commit coordinator and its
//! participants.
//!
//! This crate provides:
//! - [`Request`] frames (`Prepare`, `Commit`, `Rollback`)
//! - [`VoteResult`] prepare responses
//!
//! All integers are little-endian. Commit and rollback requests have no
//! response the coordinator reads.
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ```
//! use distlock_core::TransactionId;
//! use distlock_protocol::{MessageType, Request, VoteResult};
//!
//! let frame = Request::prepare(TransactionId::new(42)).encode();
//! let request = Request::decode(&frame).unwrap();
//! assert_eq!(request.message_type, MessageType::Prepare);
//!
//! let vote = VoteResult::decode(&[1, b'O', b'K']).unwrap();
//! assert!(vote.vote());
//! assert_eq!(vote.message(), "OK");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod message;
mod vote;

pub use error::{ProtocolError, ProtocolResult};
pub use message::{MessageType, Request, REQUEST_LEN};
pub use vote::VoteResult;
