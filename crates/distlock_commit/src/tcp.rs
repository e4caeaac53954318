//! TCP implementation of [`CommunicationManager`].

use crate::config::CommunicationConfig;
use crate::error::{ConnectError, ConnectResult, SendError, SendResult};
use crate::transport::CommunicationManager;
use distlock_core::{ParticipantId, TransactionId};
use distlock_protocol::{Request, VoteResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use tracing::{debug, info};

/// One open participant connection.
#[derive(Debug)]
struct Connection {
    addr: SocketAddr,
    stream: Mutex<TcpStream>,
    /// Second handle to the same socket, used to shut it down while a send
    /// holds `stream`.
    control: TcpStream,
}

/// Blocking TCP connections to participants.
///
/// Connect and disconnect serialize on a single gate. Sends only take a
/// short read lock on the connection table, then lock the one connection
/// they write to, so requests to different participants run in parallel.
/// Disconnect never waits for an in-flight send: it shuts the socket down,
/// which fails the blocked send.
pub struct TcpCommunicationManager {
    config: CommunicationConfig,
    gate: Mutex<()>,
    connections: RwLock<HashMap<ParticipantId, Arc<Connection>>>,
}

impl TcpCommunicationManager {
    /// Creates a manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(CommunicationConfig::default())
    }

    /// Creates a manager with the given configuration.
    pub fn with_config(config: CommunicationConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(()),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CommunicationConfig {
        &self.config
    }

    /// Returns the number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns the address a participant is connected to.
    pub fn peer_addr(&self, participant: ParticipantId) -> Option<SocketAddr> {
        self.connections.read().get(&participant).map(|c| c.addr)
    }

    fn connection(&self, participant: ParticipantId) -> SendResult<Arc<Connection>> {
        self.connections
            .read()
            .get(&participant)
            .cloned()
            .ok_or(SendError::NotConnected(participant))
    }

    fn open(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let stream = match self.config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(self.config.nodelay)?;
        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;
        Ok(stream)
    }

    fn send_decision(
        &self,
        participant: ParticipantId,
        request: Request,
    ) -> SendResult<()> {
        let conn = self.connection(participant)?;
        let mut stream = conn.stream.lock();
        stream
            .write_all(&request.encode())
            .map_err(|source| SendError::Io { participant, source })?;
        debug!(%participant, transaction = %request.transaction_id, kind = %request.message_type, "decision sent");
        Ok(())
    }
}

impl Default for TcpCommunicationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TcpCommunicationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpCommunicationManager")
            .field("config", &self.config)
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl CommunicationManager for TcpCommunicationManager {
    fn connect(&self, participant: ParticipantId, addr: SocketAddr) -> ConnectResult<()> {
        let _gate = self.gate.lock();
        if self.connections.read().contains_key(&participant) {
            return Err(ConnectError::AlreadyConnected(participant));
        }

        let (stream, control) = self
            .open(addr)
            .and_then(|stream| {
                let control = stream.try_clone()?;
                Ok((stream, control))
            })
            .map_err(|source| ConnectError::Io { participant, source })?;

        self.connections.write().insert(
            participant,
            Arc::new(Connection {
                addr,
                stream: Mutex::new(stream),
                control,
            }),
        );
        info!(%participant, %addr, "participant connected");
        Ok(())
    }

    fn disconnect(&self, participant: ParticipantId) {
        let _gate = self.gate.lock();
        let removed = self.connections.write().remove(&participant);
        if let Some(conn) = removed {
            // The peer may already have closed its side.
            let _ = conn.control.shutdown(Shutdown::Both);
            info!(%participant, addr = %conn.addr, "participant disconnected");
        }
    }

    fn is_connected(&self, participant: ParticipantId) -> bool {
        self.connections.read().contains_key(&participant)
    }

    fn send_prepare_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<VoteResult> {
        let conn = self.connection(participant)?;
        let mut stream = conn.stream.lock();

        stream
            .write_all(&Request::prepare(transaction_id).encode())
            .map_err(|source| SendError::Io { participant, source })?;

        let mut response = Vec::with_capacity(self.config.response_buffer_size);
        stream
            .read_to_end(&mut response)
            .map_err(|source| SendError::Io { participant, source })?;

        let vote = VoteResult::decode(&response)
            .map_err(|source| SendError::Protocol { participant, source })?;
        debug!(%participant, transaction = %transaction_id, vote = vote.vote(), message = vote.message(), "vote received");
        Ok(vote)
    }

    fn send_commit_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()> {
        self.send_decision(participant, Request::commit(transaction_id))
    }

    fn send_rollback_request(
        &self,
        participant: ParticipantId,
        transaction_id: TransactionId,
    ) -> SendResult<()> {
        self.send_decision(participant, Request::rollback(transaction_id))
    }
}
