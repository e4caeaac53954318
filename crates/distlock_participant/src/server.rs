//! TCP participant server.

use crate::config::ParticipantConfig;
use crate::error::{ParticipantError, ParticipantResult};
use crate::participant::Participant;
use distlock_core::TransactionId;
use distlock_protocol::{MessageType, ProtocolError, Request, REQUEST_LEN};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Advisory reply to a commit request.
pub const COMMITTED_REPLY: &[u8] = b"Transaction committed";
/// Advisory reply to a rollback request.
pub const ROLLED_BACK_REPLY: &[u8] = b"Transaction rolled back";
/// Reply to a frame with an unknown message type.
pub const UNKNOWN_TYPE_REPLY: &[u8] = b"Unknown message type";

/// Serves the participant side of the wire protocol.
///
/// Each connection reads 9-byte request frames until the peer closes it.
/// After answering a prepare the server shuts down its write half, since the
/// coordinator reads the vote until EOF; later commit or rollback requests
/// on the same connection are still applied.
pub struct ParticipantServer {
    listener: TcpListener,
    config: ParticipantConfig,
    participant: Arc<dyn Participant>,
    limiter: Arc<Semaphore>,
}

impl ParticipantServer {
    /// Binds a server to the configured address.
    ///
    /// Fails with [`ParticipantError::InvalidConfig`] if the configuration
    /// does not validate.
    pub async fn bind(
        config: ParticipantConfig,
        participant: Arc<dyn Participant>,
    ) -> ParticipantResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ParticipantError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let limiter = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            listener,
            config,
            participant,
            limiter,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> ParticipantResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    /// Accepts connections until `shutdown` completes, then waits for the
    /// connections already accepted to finish.
    pub async fn run<F>(self, shutdown: F) -> ParticipantResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(addr = %self.local_addr()?, max_connections = self.config.max_connections, "participant server listening");

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.limiter).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                () = &mut shutdown => break,
            };

            let (stream, peer) = tokio::select! {
                result = self.listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "accept failed");
                        continue;
                    }
                },
                () = &mut shutdown => break,
            };

            debug!(%peer, "connection accepted");
            let participant = Arc::clone(&self.participant);
            let idle_timeout = self.config.idle_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = serve(stream, participant.as_ref(), idle_timeout).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }

        let in_flight = self.config.max_connections - self.limiter.available_permits();
        if in_flight > 0 {
            info!(in_flight, "waiting for open connections");
        }
        let permits = u32::try_from(self.config.max_connections).unwrap_or(u32::MAX);
        let _ = self.limiter.acquire_many(permits).await;

        info!("participant server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for ParticipantServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantServer")
            .field("config", &self.config)
            .field("available_permits", &self.limiter.available_permits())
            .finish()
    }
}

async fn serve(
    mut stream: TcpStream,
    participant: &dyn Participant,
    idle_timeout: Option<Duration>,
) -> ParticipantResult<()> {
    let mut frame = [0u8; REQUEST_LEN];
    let mut responding = true;

    loop {
        let read = match idle_timeout {
            Some(limit) => timeout(limit, stream.read_exact(&mut frame))
                .await
                .map_err(|_| ParticipantError::IdleTimeout)?,
            None => stream.read_exact(&mut frame).await,
        };
        match read {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(ProtocolError::UnknownMessageType(code)) => {
                warn!(code, "unknown message type");
                if responding {
                    stream.write_all(UNKNOWN_TYPE_REPLY).await?;
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let transaction_id = request.transaction_id;
        debug!(transaction = %transaction_id, kind = %request.message_type, "request received");

        match request.message_type {
            MessageType::Prepare => {
                if !responding {
                    // The vote could not be delivered; closing tells the
                    // coordinator the response is empty.
                    warn!(transaction = %transaction_id, "prepare after response stream closed");
                    return Ok(());
                }
                let vote = participant.prepare(transaction_id);
                stream.write_all(&vote.encode()).await?;
                stream.shutdown().await?;
                responding = false;
            }
            MessageType::Commit => {
                participant.commit(transaction_id);
                acknowledge(&mut stream, responding, transaction_id, COMMITTED_REPLY).await?;
            }
            MessageType::Rollback => {
                participant.rollback(transaction_id);
                acknowledge(&mut stream, responding, transaction_id, ROLLED_BACK_REPLY).await?;
            }
        }
    }
}

async fn acknowledge(
    stream: &mut TcpStream,
    responding: bool,
    transaction_id: TransactionId,
    reply: &[u8],
) -> ParticipantResult<()> {
    info!(transaction = %transaction_id, decision = %String::from_utf8_lossy(reply), "decision applied");
    if responding {
        stream.write_all(reply).await?;
    }
    Ok(())
}
