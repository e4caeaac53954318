//! # distlock participant
//!
//! A reference participant for distlock's two-phase commit protocol.
//!
//! [`ParticipantServer`] accepts coordinator connections over TCP and hands
//! each request to a [`Participant`]. [`LedgerParticipant`] votes by a fixed
//! [`VotePolicy`] and records every decision, which makes it useful both as
//! a demo peer and in tests.
//!
//! ```no_run
//! use distlock_participant::{LedgerParticipant, ParticipantConfig, ParticipantServer};
//! use std::sync::Arc;
//!
//! # async fn example() -> distlock_participant::ParticipantResult<()> {
//! let server = ParticipantServer::bind(
//!     ParticipantConfig::default(),
//!     Arc::new(LedgerParticipant::new()),
//! )
//! .await?;
//! server.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod participant;
mod server;

pub use config::{ParticipantConfig, DEFAULT_PORT, MAX_CONNECTIONS};
pub use error::{ParticipantError, ParticipantResult};
pub use participant::{Decision, LedgerParticipant, Participant, VotePolicy};
pub use server::{ParticipantServer, COMMITTED_REPLY, ROLLED_BACK_REPLY, UNKNOWN_TYPE_REPLY};
