//! Participant command implementation.

use distlock_participant::{
    LedgerParticipant, ParticipantConfig, ParticipantServer, VotePolicy,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Runs a participant server until Ctrl-C.
pub fn run(
    bind: SocketAddr,
    vote_no: bool,
    max_connections: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = if vote_no {
        VotePolicy::No("Not ready to commit".to_string())
    } else {
        VotePolicy::default()
    };
    let ledger = Arc::new(LedgerParticipant::with_policy(policy));
    let config = ParticipantConfig::new(bind).with_max_connections(max_connections);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = ParticipantServer::bind(config, ledger.clone()).await?;
        server
            .run(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    })?;

    info!(
        committed = ledger.committed_count(),
        rolled_back = ledger.rolled_back_count(),
        "participant shut down"
    );
    Ok(())
}
