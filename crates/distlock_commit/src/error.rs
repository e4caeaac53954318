//! Error types for participant communication and the coordinator.

use distlock_core::ParticipantId;
use distlock_protocol::ProtocolError;
use std::io;
use thiserror::Error;

/// Result type for connection management.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Result type for sending requests.
pub type SendResult<T> = Result<T, SendError>;

/// Result type for coordinator operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Errors from [`connect`](crate::CommunicationManager::connect).
#[derive(Error, Debug)]
pub enum ConnectError {
    /// A connection for this participant already exists.
    #[error("{0} is already connected")]
    AlreadyConnected(ParticipantId),

    /// Opening the connection failed.
    #[error("failed to connect {participant}: {source}")]
    Io {
        /// Participant being connected.
        participant: ParticipantId,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Errors from sending a request to a participant.
#[derive(Error, Debug)]
pub enum SendError {
    /// No connection exists for this participant.
    #[error("{0} is not connected")]
    NotConnected(ParticipantId),

    /// Writing the request or reading the response failed.
    #[error("transport error with {participant}: {source}")]
    Io {
        /// Participant addressed.
        participant: ParticipantId,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The response could not be decoded.
    #[error("protocol error with {participant}: {source}")]
    Protocol {
        /// Participant addressed.
        participant: ParticipantId,
        /// Decoding error.
        #[source]
        source: ProtocolError,
    },
}

impl SendError {
    /// Returns the participant the failed request was addressed to.
    pub fn participant(&self) -> ParticipantId {
        match self {
            SendError::NotConnected(participant)
            | SendError::Io { participant, .. }
            | SendError::Protocol { participant, .. } => *participant,
        }
    }
}

/// Phase of the protocol in which a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPhase {
    /// Collecting votes.
    Prepare,
    /// Delivering a commit decision.
    Commit,
    /// Delivering a rollback decision.
    Rollback,
}

impl std::fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitPhase::Prepare => write!(f, "prepare"),
            CommitPhase::Commit => write!(f, "commit"),
            CommitPhase::Rollback => write!(f, "rollback"),
        }
    }
}

/// A transport failure that aborted a two-phase commit mid-sequence.
///
/// Participants contacted before the failure are not reconciled.
#[derive(Error, Debug)]
#[error("{phase} phase aborted: {source}")]
pub struct CommitError {
    /// Phase in which the failure happened.
    pub phase: CommitPhase,
    /// Participants that had already received this phase's request.
    pub notified: Vec<ParticipantId>,
    /// The send failure.
    #[source]
    pub source: SendError,
}

impl CommitError {
    /// Returns the participant whose request failed.
    pub fn participant(&self) -> ParticipantId {
        self.source.participant()
    }
}
