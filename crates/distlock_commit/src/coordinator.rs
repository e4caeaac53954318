//! Two-phase commit coordinator.

use crate::error::{CommitError, CommitPhase, CommitResult, SendError};
use crate::transport::CommunicationManager;
use distlock_core::{ParticipantId, TransactionId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinator-side state of a registered transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TwoPhaseState {
    /// Registered, commit not started.
    Added,
    /// Votes are being collected or the decision is being delivered.
    Preparing,
}

/// A participant that voted no.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// The participant.
    pub participant: ParticipantId,
    /// Message that came with its vote.
    pub message: String,
}

/// How a commit attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Every participant voted yes and was sent a commit.
    Committed,
    /// At least one participant voted no; every participant was sent a rollback.
    RolledBack {
        /// The no votes, in prepare order.
        rejections: Vec<Rejection>,
    },
    /// The transaction was not registered, or a commit for it was already running.
    UnknownTransaction,
}

impl CommitOutcome {
    /// Returns true if the transaction committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }
}

#[derive(Debug)]
struct TwoPhaseTransaction {
    state: TwoPhaseState,
    participants: Vec<ParticipantId>,
}

impl TwoPhaseTransaction {
    fn new() -> Self {
        Self {
            state: TwoPhaseState::Added,
            participants: Vec::new(),
        }
    }
}

/// Drives prepare then commit or rollback across a set of participants.
///
/// The coordinator's own table is guarded by one mutex that is never held
/// across network I/O. It does not touch resource locks; callers release
/// their locks after `commit` returns.
pub struct TwoPhaseCommitCoordinator<C: CommunicationManager + ?Sized> {
    comm: Arc<C>,
    transactions: Mutex<HashMap<TransactionId, TwoPhaseTransaction>>,
}

impl<C: CommunicationManager + ?Sized> TwoPhaseCommitCoordinator<C> {
    /// Creates a coordinator that talks to participants through `comm`.
    pub fn new(comm: Arc<C>) -> Self {
        Self {
            comm,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the communication manager.
    pub fn communication(&self) -> &Arc<C> {
        &self.comm
    }

    /// Registers a transaction, replacing any existing record for the id.
    ///
    /// Returns false and leaves the record alone while a commit for the id
    /// is running, so that commit keeps sole ownership of it.
    pub fn add_transaction(&self, transaction_id: TransactionId) -> bool {
        let mut table = self.transactions.lock();
        if table
            .get(&transaction_id)
            .is_some_and(|t| t.state == TwoPhaseState::Preparing)
        {
            warn!(transaction = %transaction_id, "transaction is committing, not re-registered");
            return false;
        }
        table.insert(transaction_id, TwoPhaseTransaction::new());
        debug!(transaction = %transaction_id, "transaction registered");
        true
    }

    /// Returns the state of a registered transaction.
    pub fn state(&self, transaction_id: TransactionId) -> Option<TwoPhaseState> {
        self.transactions
            .lock()
            .get(&transaction_id)
            .map(|t| t.state)
    }

    /// Returns the participants of a commit in progress.
    ///
    /// Empty for a transaction that has not started committing.
    pub fn participants(&self, transaction_id: TransactionId) -> Option<Vec<ParticipantId>> {
        self.transactions
            .lock()
            .get(&transaction_id)
            .map(|t| t.participants.clone())
    }

    /// Returns the number of registered transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Runs two-phase commit for `transaction_id` over `participants`.
    ///
    /// Participants are prepared in order. If every one votes yes they are
    /// all sent a commit; otherwise they are all sent a rollback, including
    /// those that voted yes. An empty participant set commits.
    ///
    /// # Errors
    ///
    /// A transport failure stops the sequence immediately and is returned.
    /// No rollback is sent on its behalf. The record returns to
    /// [`TwoPhaseState::Added`] so the caller may retry; participants that
    /// were already notified may see the same request again.
    pub fn commit(
        &self,
        transaction_id: TransactionId,
        participants: &[ParticipantId],
    ) -> CommitResult<CommitOutcome> {
        {
            let mut table = self.transactions.lock();
            match table.get_mut(&transaction_id) {
                Some(record) if record.state == TwoPhaseState::Added => {
                    record.state = TwoPhaseState::Preparing;
                    record.participants = participants.to_vec();
                }
                _ => {
                    warn!(transaction = %transaction_id, "commit requested for unknown transaction");
                    return Ok(CommitOutcome::UnknownTransaction);
                }
            }
        }

        match self.run(transaction_id, participants) {
            Ok(outcome) => {
                self.transactions.lock().remove(&transaction_id);
                Ok(outcome)
            }
            Err(err) => {
                if let Some(record) = self.transactions.lock().get_mut(&transaction_id) {
                    record.state = TwoPhaseState::Added;
                }
                warn!(transaction = %transaction_id, error = %err, "two-phase commit aborted");
                Err(err)
            }
        }
    }

    fn run(
        &self,
        transaction_id: TransactionId,
        participants: &[ParticipantId],
    ) -> CommitResult<CommitOutcome> {
        let mut yes_votes = 0;
        let mut rejections = Vec::new();
        let mut prepared = Vec::with_capacity(participants.len());

        for &participant in participants {
            let vote = self
                .comm
                .send_prepare_request(participant, transaction_id)
                .map_err(|source| failure(CommitPhase::Prepare, &prepared, source))?;
            prepared.push(participant);

            if vote.vote() {
                yes_votes += 1;
            } else {
                debug!(transaction = %transaction_id, %participant, message = vote.message(), "participant voted no");
                rejections.push(Rejection {
                    participant,
                    message: vote.message().to_string(),
                });
            }
        }

        if yes_votes == participants.len() {
            self.deliver(CommitPhase::Commit, transaction_id, participants)?;
            info!(transaction = %transaction_id, participants = participants.len(), "transaction committed");
            Ok(CommitOutcome::Committed)
        } else {
            self.deliver(CommitPhase::Rollback, transaction_id, participants)?;
            info!(transaction = %transaction_id, rejections = rejections.len(), "transaction rolled back");
            Ok(CommitOutcome::RolledBack { rejections })
        }
    }

    fn deliver(
        &self,
        phase: CommitPhase,
        transaction_id: TransactionId,
        participants: &[ParticipantId],
    ) -> CommitResult<()> {
        for (sent, &participant) in participants.iter().enumerate() {
            let result = match phase {
                CommitPhase::Rollback => self.comm.send_rollback_request(participant, transaction_id),
                _ => self.comm.send_commit_request(participant, transaction_id),
            };
            result.map_err(|source| failure(phase, &participants[..sent], source))?;
        }
        Ok(())
    }
}

fn failure(phase: CommitPhase, notified: &[ParticipantId], source: SendError) -> CommitError {
    CommitError {
        phase,
        notified: notified.to_vec(),
        source,
    }
}

impl<C: CommunicationManager + ?Sized> std::fmt::Debug for TwoPhaseCommitCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoPhaseCommitCoordinator")
            .field("transactions", &self.transaction_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCommunicationManager;
    use distlock_protocol::{MessageType, VoteResult};
    use std::net::SocketAddr;
    use std::sync::mpsc;
    use std::thread;

    fn setup(ids: &[u32]) -> (Arc<MockCommunicationManager>, TwoPhaseCommitCoordinator<MockCommunicationManager>) {
        let comm = Arc::new(MockCommunicationManager::new());
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        for &id in ids {
            comm.connect(ParticipantId::new(id), addr).unwrap();
        }
        let coordinator = TwoPhaseCommitCoordinator::new(Arc::clone(&comm));
        (comm, coordinator)
    }

    fn pids(ids: &[u32]) -> Vec<ParticipantId> {
        ids.iter().copied().map(ParticipantId::new).collect()
    }

    #[test]
    fn unanimous_yes_commits() {
        let (comm, coordinator) = setup(&[1, 2, 3]);
        let txn = TransactionId::new(10);
        coordinator.add_transaction(txn);
        assert_eq!(coordinator.state(txn), Some(TwoPhaseState::Added));

        let outcome = coordinator.commit(txn, &pids(&[1, 2, 3])).unwrap();
        assert!(outcome.is_committed());
        assert_eq!(coordinator.transaction_count(), 0);

        for p in pids(&[1, 2, 3]) {
            assert_eq!(comm.sent_to(p), vec![MessageType::Prepare, MessageType::Commit]);
        }
    }

    #[test]
    fn single_no_rolls_back_everyone() {
        let (comm, coordinator) = setup(&[1, 2, 3]);
        comm.set_vote(ParticipantId::new(2), VoteResult::no("disk full"));
        let txn = TransactionId::new(11);
        coordinator.add_transaction(txn);

        let outcome = coordinator.commit(txn, &pids(&[1, 2, 3])).unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::RolledBack {
                rejections: vec![Rejection {
                    participant: ParticipantId::new(2),
                    message: "disk full".into(),
                }],
            }
        );
        // Everyone is still prepared before the decision.
        for p in pids(&[1, 2, 3]) {
            assert_eq!(comm.sent_to(p), vec![MessageType::Prepare, MessageType::Rollback]);
        }
        assert!(coordinator.state(txn).is_none());
    }

    #[test]
    fn unknown_transaction_sends_nothing() {
        let (comm, coordinator) = setup(&[1]);
        let outcome = coordinator.commit(TransactionId::new(99), &pids(&[1])).unwrap();
        assert_eq!(outcome, CommitOutcome::UnknownTransaction);
        assert!(!outcome.is_committed());
        assert!(comm.sent().is_empty());
    }

    #[test]
    fn record_is_consumed_once() {
        let (_comm, coordinator) = setup(&[1]);
        let txn = TransactionId::new(12);
        coordinator.add_transaction(txn);

        assert!(coordinator.commit(txn, &pids(&[1])).unwrap().is_committed());
        assert_eq!(
            coordinator.commit(txn, &pids(&[1])).unwrap(),
            CommitOutcome::UnknownTransaction
        );
    }

    #[test]
    fn empty_participant_set_commits() {
        let (comm, coordinator) = setup(&[]);
        let txn = TransactionId::new(13);
        coordinator.add_transaction(txn);
        assert!(coordinator.commit(txn, &[]).unwrap().is_committed());
        assert!(comm.sent().is_empty());
    }

    #[test]
    fn prepare_failure_aborts_without_rollback() {
        let (comm, coordinator) = setup(&[1, 2, 3]);
        comm.fail_on(ParticipantId::new(2), MessageType::Prepare);
        let txn = TransactionId::new(14);
        coordinator.add_transaction(txn);

        let err = coordinator.commit(txn, &pids(&[1, 2, 3])).unwrap_err();
        assert_eq!(err.phase, CommitPhase::Prepare);
        assert_eq!(err.participant(), ParticipantId::new(2));
        assert_eq!(err.notified, pids(&[1]));

        // Nothing after the failure, and no rollback for participant 1.
        assert_eq!(comm.sent_to(ParticipantId::new(1)), vec![MessageType::Prepare]);
        assert!(comm.sent_to(ParticipantId::new(3)).is_empty());
        assert_eq!(coordinator.state(txn), Some(TwoPhaseState::Added));
    }

    #[test]
    fn commit_failure_reports_notified_participants() {
        let (comm, coordinator) = setup(&[1, 2]);
        comm.fail_on(ParticipantId::new(2), MessageType::Commit);
        let txn = TransactionId::new(15);
        coordinator.add_transaction(txn);

        let err = coordinator.commit(txn, &pids(&[1, 2])).unwrap_err();
        assert_eq!(err.phase, CommitPhase::Commit);
        assert_eq!(err.notified, pids(&[1]));
    }

    #[test]
    fn not_connected_participant_is_transport_error() {
        let (_comm, coordinator) = setup(&[1]);
        let txn = TransactionId::new(16);
        coordinator.add_transaction(txn);

        let err = coordinator.commit(txn, &pids(&[1, 7])).unwrap_err();
        assert!(matches!(err.source, SendError::NotConnected(p) if p == ParticipantId::new(7)));
    }

    /// Blocks every prepare until the test lets it through.
    struct GatedComm {
        entered: Mutex<mpsc::Sender<()>>,
        proceed: Mutex<mpsc::Receiver<()>>,
    }

    impl CommunicationManager for GatedComm {
        fn connect(&self, _: ParticipantId, _: SocketAddr) -> crate::ConnectResult<()> {
            Ok(())
        }

        fn disconnect(&self, _: ParticipantId) {}

        fn is_connected(&self, _: ParticipantId) -> bool {
            true
        }

        fn send_prepare_request(
            &self,
            _: ParticipantId,
            _: TransactionId,
        ) -> crate::SendResult<VoteResult> {
            self.entered.lock().send(()).unwrap();
            self.proceed.lock().recv().unwrap();
            Ok(VoteResult::yes("Ready to commit"))
        }

        fn send_commit_request(&self, _: ParticipantId, _: TransactionId) -> crate::SendResult<()> {
            Ok(())
        }

        fn send_rollback_request(&self, _: ParticipantId, _: TransactionId) -> crate::SendResult<()> {
            Ok(())
        }
    }

    #[test]
    fn commit_in_progress_keeps_its_record() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (proceed_tx, proceed_rx) = mpsc::channel();
        let coordinator = Arc::new(TwoPhaseCommitCoordinator::new(Arc::new(GatedComm {
            entered: Mutex::new(entered_tx),
            proceed: Mutex::new(proceed_rx),
        })));
        let txn = TransactionId::new(19);
        assert!(coordinator.add_transaction(txn));

        let committer = Arc::clone(&coordinator);
        let first = thread::spawn(move || committer.commit(txn, &pids(&[1])));
        entered_rx.recv().unwrap();

        // Re-registering mid-commit is refused and cannot start a second commit.
        assert!(!coordinator.add_transaction(txn));
        assert_eq!(coordinator.state(txn), Some(TwoPhaseState::Preparing));
        assert_eq!(
            coordinator.commit(txn, &pids(&[1])).unwrap(),
            CommitOutcome::UnknownTransaction
        );

        proceed_tx.send(()).unwrap();
        assert!(first.join().unwrap().unwrap().is_committed());
        assert!(coordinator.state(txn).is_none());
        assert!(coordinator.add_transaction(txn));
    }

    #[test]
    fn add_transaction_overwrites() {
        let (_comm, coordinator) = setup(&[]);
        let txn = TransactionId::new(17);
        assert!(coordinator.add_transaction(txn));
        assert!(coordinator.add_transaction(txn));
        assert_eq!(coordinator.transaction_count(), 1);
        assert_eq!(coordinator.participants(txn), Some(Vec::new()));
    }

    #[test]
    fn works_through_trait_object() {
        let comm: Arc<dyn CommunicationManager> = Arc::new(MockCommunicationManager::new());
        let coordinator = TwoPhaseCommitCoordinator::new(comm);
        let txn = TransactionId::new(18);
        coordinator.add_transaction(txn);
        assert!(coordinator.commit(txn, &[]).unwrap().is_committed());
    }
}
