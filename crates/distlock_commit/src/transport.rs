//! Participant communication abstraction.

use crate::error::{ConnectResult, SendResult};
use distlock_core::{ParticipantId, TransactionId};
use distlock_protocol::VoteResult;
use std::net::SocketAddr;

/// Connections from the coordinator to its participants.
///
/// At most one connection exists per participant id. Requests are
/// synchronous: each call returns once the request has been written and, for
/// prepare, once the full response has been read.
pub trait CommunicationManager: Send + Sync {
    /// Opens a connection to `addr` for `participant`.
    ///
    /// Fails with [`ConnectError::AlreadyConnected`](crate::ConnectError::AlreadyConnected)
    /// if a connection for this id already exists.
    ///
    /// The connection carries a single prepare. A peer configured with an
    /// idle timeout may close it if the prepare comes later than that; the
    /// prepare then fails with an empty response or an I/O error.
    fn connect(&self, participant: ParticipantId, addr: SocketAddr) -> ConnectResult<()>;

    /// Closes and forgets the connection for `participant`. No-op if absent.
    fn disconnect(&self, participant: ParticipantId);

    /// Returns true if a connection for `participant` exists.
    fn is_connected(&self, participant: ParticipantId) -> bool;

    /// Sends a prepare request and returns the participant's vote.
    fn send_prepare_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<VoteResult>;

    /// Sends a commit decision. No response is read.
    fn send_commit_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()>;

    /// Sends a rollback decision. No response is read.
    fn send_rollback_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()>;
}
