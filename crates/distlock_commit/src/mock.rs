//! In-memory [`CommunicationManager`] for tests.

use crate::error::{ConnectError, ConnectResult, SendError, SendResult};
use crate::transport::CommunicationManager;
use distlock_core::{ParticipantId, TransactionId};
use distlock_protocol::{MessageType, VoteResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;

/// A request observed by [`MockCommunicationManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentRequest {
    /// Addressed participant.
    pub participant: ParticipantId,
    /// Request kind.
    pub message_type: MessageType,
    /// Transaction in the request.
    pub transaction_id: TransactionId,
}

#[derive(Debug, Default)]
struct MockState {
    connected: HashSet<ParticipantId>,
    votes: HashMap<ParticipantId, VoteResult>,
    failing: HashMap<ParticipantId, MessageType>,
    sent: Vec<SentRequest>,
}

/// A communication manager that never touches the network.
///
/// Participants vote yes unless a vote is set with
/// [`set_vote`](Self::set_vote). A failure can be injected for one message
/// type per participant.
#[derive(Debug, Default)]
pub struct MockCommunicationManager {
    state: Mutex<MockState>,
}

impl MockCommunicationManager {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vote a participant returns on prepare.
    pub fn set_vote(&self, participant: ParticipantId, vote: VoteResult) {
        self.state.lock().votes.insert(participant, vote);
    }

    /// Makes requests of `message_type` to `participant` fail with an I/O error.
    pub fn fail_on(&self, participant: ParticipantId, message_type: MessageType) {
        self.state.lock().failing.insert(participant, message_type);
    }

    /// Returns every request sent so far, in order.
    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().sent.clone()
    }

    /// Returns the kinds of requests sent to one participant, in order.
    pub fn sent_to(&self, participant: ParticipantId) -> Vec<MessageType> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|r| r.participant == participant)
            .map(|r| r.message_type)
            .collect()
    }

    fn record(
        &self,
        participant: ParticipantId,
        message_type: MessageType,
        transaction_id: TransactionId,
    ) -> SendResult<VoteResult> {
        let mut state = self.state.lock();
        if !state.connected.contains(&participant) {
            return Err(SendError::NotConnected(participant));
        }
        if state.failing.get(&participant) == Some(&message_type) {
            return Err(SendError::Io {
                participant,
                source: io::Error::new(io::ErrorKind::ConnectionReset, "injected failure"),
            });
        }
        state.sent.push(SentRequest {
            participant,
            message_type,
            transaction_id,
        });
        Ok(state
            .votes
            .get(&participant)
            .cloned()
            .unwrap_or_else(|| VoteResult::yes("Ready to commit")))
    }
}

impl CommunicationManager for MockCommunicationManager {
    fn connect(&self, participant: ParticipantId, _addr: SocketAddr) -> ConnectResult<()> {
        let mut state = self.state.lock();
        if !state.connected.insert(participant) {
            return Err(ConnectError::AlreadyConnected(participant));
        }
        Ok(())
    }

    fn disconnect(&self, participant: ParticipantId) {
        self.state.lock().connected.remove(&participant);
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.state.lock().connected.contains(&participant)
    }

    fn send_prepare_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<VoteResult> {
        self.record(participant, MessageType::Prepare, transaction_id)
    }

    fn send_commit_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()> {
        self.record(participant, MessageType::Commit, transaction_id)
            .map(|_| ())
    }

    fn send_rollback_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()> {
        self.record(participant, MessageType::Rollback, transaction_id)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn mock_connection_lifecycle() {
        let comm = MockCommunicationManager::new();
        let p = ParticipantId::new(1);

        comm.connect(p, addr()).unwrap();
        assert!(comm.is_connected(p));
        assert!(matches!(
            comm.connect(p, addr()),
            Err(ConnectError::AlreadyConnected(_))
        ));

        comm.disconnect(p);
        assert!(!comm.is_connected(p));
        comm.disconnect(p);
    }

    #[test]
    fn mock_default_vote_is_yes() {
        let comm = MockCommunicationManager::new();
        let p = ParticipantId::new(2);
        comm.connect(p, addr()).unwrap();

        let vote = comm.send_prepare_request(p, TransactionId::new(5)).unwrap();
        assert!(vote.vote());
        assert_eq!(comm.sent_to(p), vec![MessageType::Prepare]);
    }

    #[test]
    fn mock_injected_failure() {
        let comm = MockCommunicationManager::new();
        let p = ParticipantId::new(3);
        comm.connect(p, addr()).unwrap();
        comm.fail_on(p, MessageType::Commit);

        assert!(comm.send_prepare_request(p, TransactionId::new(1)).is_ok());
        let err = comm.send_commit_request(p, TransactionId::new(1)).unwrap_err();
        assert!(matches!(err, SendError::Io { .. }));
        assert_eq!(comm.sent_to(p), vec![MessageType::Prepare]);
    }
}
