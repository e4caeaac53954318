//! Demo command implementation.
//!
//! Runs transactions one after another. Each one connects a fresh
//! participant, takes an exclusive lock on the resource named after that
//! participant, stamps the transaction, commits it through the coordinator
//! and then tears everything down again.

use distlock_commit::{
    CommitOutcome, CommunicationConfig, CommunicationManager, TcpCommunicationManager,
    TwoPhaseCommitCoordinator,
};
use distlock_core::{
    DeadlockDetector, LockManager, LockManagerConfig, LockMode, LockStatsSnapshot, ParticipantId,
    ResourceId, TimestampAssigner, TransactionId,
};
use distlock_participant::{
    LedgerParticipant, ParticipantConfig, ParticipantResult, ParticipantServer,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Demo settings.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Participant server address.
    pub participant: SocketAddr,
    /// Number of transactions to run.
    pub transactions: usize,
    /// Stall detector sweep interval.
    pub detect_interval: Duration,
    /// Whether to start an in-process participant.
    pub spawn_participant: bool,
}

/// Demo result.
#[derive(Debug, Serialize)]
pub struct DemoSummary {
    /// Participant address used.
    pub participant: String,
    /// Transactions attempted.
    pub transactions: usize,
    /// Transactions committed.
    pub committed: usize,
    /// Transactions rolled back.
    pub rolled_back: usize,
    /// Transactions that failed before a decision.
    pub failed: usize,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Lock manager counters at the end of the run.
    pub locks: LockStatsSnapshot,
    /// Timestamps still assigned at the end of the run.
    pub outstanding_timestamps: usize,
    /// Commits recorded by the in-process participant, if one was started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_commits: Option<usize>,
}

enum TransactionResult {
    Committed,
    RolledBack,
    Failed,
}

/// A participant server running on its own runtime.
struct LocalParticipant {
    runtime: Runtime,
    stop: oneshot::Sender<()>,
    task: JoinHandle<ParticipantResult<()>>,
    ledger: Arc<LedgerParticipant>,
    addr: SocketAddr,
}

impl LocalParticipant {
    fn start(addr: SocketAddr) -> Result<Self, Box<dyn std::error::Error>> {
        let runtime = Runtime::new()?;
        let ledger = Arc::new(LedgerParticipant::new());
        let server = runtime.block_on(ParticipantServer::bind(
            ParticipantConfig::new(addr),
            ledger.clone(),
        ))?;
        let addr = server.local_addr()?;
        let (stop, rx) = oneshot::channel();
        let task = runtime.spawn(server.run(async {
            let _ = rx.await;
        }));
        Ok(Self {
            runtime,
            stop,
            task,
            ledger,
            addr,
        })
    }

    fn shutdown(self) -> usize {
        let _ = self.stop.send(());
        match self.runtime.block_on(self.task) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "participant server failed"),
            Err(e) => warn!(error = %e, "participant server task panicked"),
        }
        self.ledger.committed_count()
    }
}

/// Runs the demo command.
pub fn run(options: &DemoOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let summary = execute(options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text(&summary);
        }
    }

    Ok(())
}

/// Runs the demo and returns its summary.
pub fn execute(options: &DemoOptions) -> Result<DemoSummary, Box<dyn std::error::Error>> {
    let local = if options.spawn_participant {
        Some(LocalParticipant::start(options.participant)?)
    } else {
        None
    };
    let target = local.as_ref().map_or(options.participant, |l| l.addr);

    let lock_manager = Arc::new(LockManager::with_config(
        LockManagerConfig::new().detection_interval(options.detect_interval),
    ));
    let detector = DeadlockDetector::spawn_configured(Arc::clone(&lock_manager))?;
    let timestamps = TimestampAssigner::new();
    let comm = Arc::new(TcpCommunicationManager::with_config(
        CommunicationConfig::new()
            .with_connect_timeout(Duration::from_secs(5))
            .with_read_timeout(Duration::from_secs(30)),
    ));
    let coordinator = TwoPhaseCommitCoordinator::new(Arc::clone(&comm));

    let started = Instant::now();
    let (mut committed, mut rolled_back, mut failed) = (0, 0, 0);

    for n in 0..options.transactions {
        let transaction_id = TransactionId::new(n as i64);
        let result = run_transaction(
            transaction_id,
            target,
            &lock_manager,
            &timestamps,
            &coordinator,
        );
        match result {
            TransactionResult::Committed => committed += 1,
            TransactionResult::RolledBack => rolled_back += 1,
            TransactionResult::Failed => failed += 1,
        }
    }

    let elapsed = started.elapsed();
    detector.stop();

    Ok(DemoSummary {
        participant: target.to_string(),
        transactions: options.transactions,
        committed,
        rolled_back,
        failed,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        locks: lock_manager.stats().snapshot(),
        outstanding_timestamps: timestamps.len(),
        participant_commits: local.map(LocalParticipant::shutdown),
    })
}

fn run_transaction(
    transaction_id: TransactionId,
    target: SocketAddr,
    lock_manager: &LockManager,
    timestamps: &TimestampAssigner,
    coordinator: &TwoPhaseCommitCoordinator<TcpCommunicationManager>,
) -> TransactionResult {
    let comm = coordinator.communication();
    let participant = participant_id(Uuid::new_v4());

    if let Err(e) = comm.connect(participant, target) {
        warn!(%participant, error = %e, "failed to connect participant");
        return TransactionResult::Failed;
    }

    coordinator.add_transaction(transaction_id);

    let resource = ResourceId::new(u64::from(participant.as_u32()));
    if let Some(waiter) = lock_manager
        .acquire_lock(transaction_id, resource, LockMode::X)
        .into_waiter()
    {
        if let Err(e) = waiter.wait() {
            warn!(transaction = %transaction_id, error = %e, "lock wait failed");
            comm.disconnect(participant);
            return TransactionResult::Failed;
        }
    }

    let timestamp = timestamps.assign_timestamp(transaction_id);

    let result = match coordinator.commit(transaction_id, &[participant]) {
        Ok(CommitOutcome::Committed) => {
            info!(transaction = %transaction_id, timestamp, "transaction committed");
            TransactionResult::Committed
        }
        Ok(CommitOutcome::RolledBack { rejections }) => {
            info!(transaction = %transaction_id, rejections = rejections.len(), "transaction rolled back");
            TransactionResult::RolledBack
        }
        Ok(CommitOutcome::UnknownTransaction) => TransactionResult::Failed,
        Err(e) => {
            warn!(transaction = %transaction_id, error = %e, "commit failed");
            TransactionResult::Failed
        }
    };

    lock_manager.release_lock(transaction_id, resource, LockMode::X);
    comm.disconnect(participant);
    timestamps.remove_timestamp(transaction_id);
    result
}

/// Derives a participant id from the first four bytes of a UUID.
fn participant_id(uuid: Uuid) -> ParticipantId {
    let b = uuid.as_bytes();
    ParticipantId::new(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn print_text(summary: &DemoSummary) {
    println!("distlock demo");
    println!("=============");
    println!();
    println!("Participant: {}", summary.participant);
    println!("Elapsed:     {} ms", summary.elapsed_ms);
    println!();
    println!("Transactions:");
    println!("  Attempted:   {}", summary.transactions);
    println!("  Committed:   {}", summary.committed);
    println!("  Rolled back: {}", summary.rolled_back);
    println!("  Failed:      {}", summary.failed);
    println!();
    println!("Locks:");
    println!("  Granted on arrival: {}", summary.locks.acquisitions);
    println!("  Queued:             {}", summary.locks.waits);
    println!("  Released:           {}", summary.locks.releases);
    println!("  Aborted waiters:    {}", summary.locks.aborted_waiters);
    println!("  Detector sweeps:    {}", summary.locks.sweeps);
    println!();
    println!("Outstanding timestamps: {}", summary.outstanding_timestamps);
    if let Some(commits) = summary.participant_commits {
        println!("Participant commits:    {commits}");
    }
}
