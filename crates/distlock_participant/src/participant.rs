//! Participant-side transaction handling.

use distlock_core::TransactionId;
use distlock_protocol::VoteResult;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// The local side of two-phase commit.
///
/// Calls for one transaction arrive in protocol order, but calls for
/// different transactions may run concurrently.
pub trait Participant: Send + Sync {
    /// Votes on whether `transaction_id` can commit.
    fn prepare(&self, transaction_id: TransactionId) -> VoteResult;

    /// Applies a commit decision.
    fn commit(&self, transaction_id: TransactionId);

    /// Applies a rollback decision.
    fn rollback(&self, transaction_id: TransactionId);
}

/// How a [`LedgerParticipant`] votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VotePolicy {
    /// Always vote yes with the given message.
    Yes(String),
    /// Always vote no with the given message.
    No(String),
}

impl Default for VotePolicy {
    fn default() -> Self {
        VotePolicy::Yes("Ready to commit".to_string())
    }
}

/// Where a transaction stands from the participant's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// Voted, no decision received yet.
    Prepared {
        /// The vote cast.
        vote: bool,
    },
    /// Commit applied.
    Committed,
    /// Rollback applied.
    RolledBack,
}

/// A participant that votes by policy and records every decision.
#[derive(Debug, Default)]
pub struct LedgerParticipant {
    policy: VotePolicy,
    ledger: Mutex<HashMap<TransactionId, Decision>>,
}

impl LedgerParticipant {
    /// Creates a participant that always votes yes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a participant with the given policy.
    pub fn with_policy(policy: VotePolicy) -> Self {
        Self {
            policy,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the vote policy.
    pub fn policy(&self) -> &VotePolicy {
        &self.policy
    }

    /// Returns the recorded state of a transaction.
    pub fn decision(&self, transaction_id: TransactionId) -> Option<Decision> {
        self.ledger.lock().get(&transaction_id).copied()
    }

    /// Returns every recorded transaction with its state, sorted by id.
    pub fn entries(&self) -> Vec<(TransactionId, Decision)> {
        let mut entries: Vec<_> = self.ledger.lock().iter().map(|(t, d)| (*t, *d)).collect();
        entries.sort_by_key(|(t, _)| *t);
        entries
    }

    /// Returns the number of committed transactions.
    pub fn committed_count(&self) -> usize {
        self.count(Decision::Committed)
    }

    /// Returns the number of rolled back transactions.
    pub fn rolled_back_count(&self) -> usize {
        self.count(Decision::RolledBack)
    }

    fn count(&self, decision: Decision) -> usize {
        self.ledger.lock().values().filter(|d| **d == decision).count()
    }
}

impl Participant for LedgerParticipant {
    fn prepare(&self, transaction_id: TransactionId) -> VoteResult {
        let vote = match &self.policy {
            VotePolicy::Yes(message) => VoteResult::yes(message.clone()),
            VotePolicy::No(message) => VoteResult::no(message.clone()),
        };
        self.ledger
            .lock()
            .insert(transaction_id, Decision::Prepared { vote: vote.vote() });
        vote
    }

    fn commit(&self, transaction_id: TransactionId) {
        self.ledger.lock().insert(transaction_id, Decision::Committed);
    }

    fn rollback(&self, transaction_id: TransactionId) {
        self.ledger.lock().insert(transaction_id, Decision::RolledBack);
    }
}
