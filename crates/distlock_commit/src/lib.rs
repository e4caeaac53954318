//! # distlock commit
//!
//! Two-phase commit coordination for distlock.
//!
//! This crate provides:
//! - [`CommunicationManager`], the coordinator's view of its participants
//! - [`TcpCommunicationManager`], blocking TCP connections speaking the
//!   `distlock_protocol` wire format
//! - [`MockCommunicationManager`], an in-memory double for tests
//! - [`TwoPhaseCommitCoordinator`], which drives prepare and then commit or
//!   rollback
//!
//! ```
//! use distlock_commit::{MockCommunicationManager, TwoPhaseCommitCoordinator};
//! use distlock_core::TransactionId;
//! use std::sync::Arc;
//!
//! let coordinator = TwoPhaseCommitCoordinator::new(Arc::new(MockCommunicationManager::new()));
//! let txn = TransactionId::new(1);
//! coordinator.add_transaction(txn);
//! assert!(coordinator.commit(txn, &[]).unwrap().is_committed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod coordinator;
mod error;
mod mock;
mod tcp;
mod transport;

pub use config::CommunicationConfig;
pub use coordinator::{CommitOutcome, Rejection, TwoPhaseCommitCoordinator, TwoPhaseState};
pub use error::{
    CommitError, CommitPhase, CommitResult, ConnectError, ConnectResult, SendError, SendResult,
};
pub use mock::{MockCommunicationManager, SentRequest};
pub use tcp::TcpCommunicationManager;
pub use transport::CommunicationManager;
