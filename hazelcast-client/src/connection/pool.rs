//! Pool of authenticated member connections and their reader tasks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use hazelcast_core::protocol::codecs::client::{
    AuthenticationResponse, AuthenticationStatus, ClientAuthenticationCodec, ClientPingCodec,
};
use hazelcast_core::protocol::codecs::decode_error_response;
use hazelcast_core::protocol::{
    Frame, FrameCodec, OperationCodec, CLIENT_PROTOCOL_PREAMBLE, RESPONSE_EXCEPTION,
};
use hazelcast_core::{HazelcastError, Result};
use parking_lot::{Mutex, RwLock};
use rand::seq::IteratorRandom;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::instrument;

use super::connection::{Connection, ConnectionId, HEARTBEAT_CORRELATION_ID};
use crate::config::ClientConfig;

/// Client implementation tag sent on authentication.
const CLIENT_TYPE: &str = "RST";
/// Serialization version sent on authentication.
const SERIALIZATION_VERSION: u8 = 1;

type FrameReader = FramedRead<OwnedReadHalf, FrameCodec>;
type ConnectionMap = Arc<RwLock<HashMap<SocketAddr, Arc<Connection>>>>;

/// Receives everything a connection's reader task decodes.
///
/// Both methods run on the reader task and must not block.
pub trait InboundHandler: Send + Sync {
    /// Called for every inbound frame, in arrival order.
    fn handle_frame(&self, address: SocketAddr, frame: Frame);

    /// Called exactly once per connection, after it left the pool.
    fn connection_closed(&self, address: SocketAddr, reason: &str);
}

/// Events emitted during connection lifecycle.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Authenticated to a cluster member.
    Connected {
        /// The connection identifier.
        id: ConnectionId,
        /// The address of the connected member.
        address: SocketAddr,
    },
    /// A connection closed.
    Disconnected {
        /// The connection identifier.
        id: ConnectionId,
        /// The address of the disconnected member.
        address: SocketAddr,
        /// Why the connection ended.
        reason: String,
    },
}

/// Identity the cluster assigned on the first authentication, presented on
/// every later connection.
#[derive(Debug, Clone, Default)]
struct ClientIdentity {
    uuid: Option<String>,
    owner_uuid: Option<String>,
}

/// Connections keyed by member address.
///
/// The pool never retries. Failures surface as `ConnectionLost` and the
/// invocation layer decides what to do with them.
#[derive(Debug)]
pub struct ConnectionPool {
    config: Arc<ClientConfig>,
    connections: ConnectionMap,
    identity: Mutex<ClientIdentity>,
    connect_lock: AsyncMutex<()>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<ConnectionEvent>,
    shutdown: watch::Sender<bool>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let (events, _) = broadcast::channel(64);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            connections: Arc::new(RwLock::new(HashMap::new())),
            identity: Mutex::new(ClientIdentity::default()),
            connect_lock: AsyncMutex::new(()),
            readers: Mutex::new(Vec::new()),
            events,
            shutdown,
        }
    }

    /// Subscribes to connection lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Returns the live connection to `address`, if any.
    pub fn get(&self, address: &SocketAddr) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .get(address)
            .filter(|c| c.is_alive())
            .cloned()
    }

    /// Returns a random live connection.
    pub fn any(&self) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .filter(|c| c.is_alive())
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    /// Returns the addresses of all pooled connections.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.connections.read().keys().copied().collect()
    }

    /// Returns the number of pooled connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns true if no connection is pooled.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Returns the uuid the cluster assigned to this client, once known.
    pub fn client_uuid(&self) -> Option<String> {
        self.identity.lock().uuid.clone()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Returns the connection to `address`, opening and authenticating one
    /// if needed. Frames read from a new connection go to `handler`.
    ///
    /// # Errors
    ///
    /// - `Connection` if the member is unreachable or the pool is shut down
    /// - `Timeout` if connecting and authenticating exceed the connection
    ///   timeout
    /// - `Authentication` if the member rejects the credentials
    #[instrument(name = "connection_pool.connect", skip(self, handler), fields(address = %address))]
    pub async fn connect(
        &self,
        address: SocketAddr,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Arc<Connection>> {
        if let Some(connection) = self.get(&address) {
            return Ok(connection);
        }

        let _connecting = self.connect_lock.lock().await;
        if let Some(connection) = self.get(&address) {
            return Ok(connection);
        }
        if self.is_shutdown() {
            return Err(HazelcastError::Connection(
                "connection pool is shut down".to_string(),
            ));
        }

        let connect_timeout = self.config.network().connection_timeout();
        tracing::debug!(timeout = ?connect_timeout, "attempting connection");
        let (connection, reader) = timeout(connect_timeout, self.open(address))
            .await
            .map_err(|_| {
                tracing::warn!(timeout = ?connect_timeout, "connection attempt timed out");
                HazelcastError::Timeout(format!(
                    "connection to {} timed out after {:?}",
                    address, connect_timeout
                ))
            })??;

        let connection = Arc::new(connection);
        let id = connection.id();
        let closed = connection.closed_signal();
        self.connections
            .write()
            .insert(address, Arc::clone(&connection));
        self.spawn_reader(Arc::clone(&connection), reader, closed, handler);

        let _ = self.events.send(ConnectionEvent::Connected { id, address });
        tracing::info!(
            id = %id,
            member = connection.member_uuid().unwrap_or("unknown"),
            "connected to cluster member"
        );
        Ok(connection)
    }

    async fn open(&self, address: SocketAddr) -> Result<(Connection, FrameReader)> {
        let mut stream = TcpStream::connect(address).await.map_err(|e| {
            HazelcastError::Connection(format!("failed to connect to {}: {}", address, e))
        })?;
        stream.set_nodelay(true).map_err(|e| {
            HazelcastError::Connection(format!("failed to set TCP_NODELAY: {}", e))
        })?;
        stream.write_all(CLIENT_PROTOCOL_PREAMBLE).await?;

        let max_frame_size = self.config.network().max_frame_size();
        let (read_half, write_half) = stream.into_split();
        let mut reader =
            FramedRead::new(read_half, FrameCodec::with_max_frame_size(max_frame_size));
        let mut writer =
            FramedWrite::new(write_half, FrameCodec::with_max_frame_size(max_frame_size));

        let response = self.authenticate(address, &mut reader, &mut writer).await?;
        Ok((Connection::new(address, response.uuid, writer), reader))
    }

    async fn authenticate(
        &self,
        address: SocketAddr,
        reader: &mut FrameReader,
        writer: &mut FramedWrite<OwnedWriteHalf, FrameCodec>,
    ) -> Result<AuthenticationResponse> {
        let identity = self.identity.lock().clone();
        let (username, password) = self.config.credentials();
        let request = ClientAuthenticationCodec {
            username,
            password,
            uuid: identity.uuid.as_deref(),
            owner_uuid: identity.owner_uuid.as_deref(),
            is_owner_connection: identity.uuid.is_none(),
            client_type: CLIENT_TYPE,
            serialization_version: SERIALIZATION_VERSION,
        }
        .encode_request();
        writer.send(&request).await?;

        let frame = reader.next().await.ok_or_else(|| {
            HazelcastError::ConnectionLost(format!("{} closed during authentication", address))
        })??;
        if frame.message_type() == RESPONSE_EXCEPTION {
            return Err(decode_error_response(&frame));
        }

        let response = ClientAuthenticationCodec::decode_response(&frame)?;
        if response.status != AuthenticationStatus::Authenticated {
            tracing::warn!(status = ?response.status, "authentication rejected");
            return Err(HazelcastError::Authentication(format!(
                "{} rejected authentication: {:?}",
                address, response.status
            )));
        }

        let mut identity = self.identity.lock();
        if identity.uuid.is_none() {
            identity.uuid = response.uuid.clone();
            identity.owner_uuid = response.owner_uuid.clone();
        }
        Ok(response)
    }

    /// Runs the read loop of `connection` until the member or the client
    /// closes it. Exits at once if `closed` already reads true.
    fn spawn_reader(
        &self,
        connection: Arc<Connection>,
        mut reader: FrameReader,
        mut closed: watch::Receiver<bool>,
        handler: Arc<dyn InboundHandler>,
    ) {
        let connections = Arc::clone(&self.connections);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let id = connection.id();
            let address = connection.address();
            let reason = loop {
                tokio::select! {
                    next = reader.next() => match next {
                        Some(Ok(frame)) => {
                            connection.touch_read();
                            handler.handle_frame(address, frame);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(id = %id, address = %address, error = %e, "read failed");
                            break e.to_string();
                        }
                        None => break "closed by member".to_string(),
                    },
                    _ = closed.wait_for(|closed| *closed) => {
                        break "closed by client".to_string()
                    }
                }
            };

            connection.mark_closed();
            connection.shutdown_writer().await;
            {
                let mut map = connections.write();
                if map.get(&address).is_some_and(|c| c.id() == id) {
                    map.remove(&address);
                }
            }

            let _ = events.send(ConnectionEvent::Disconnected {
                id,
                address,
                reason: reason.clone(),
            });
            tracing::info!(id = %id, address = %address, reason = %reason, "connection closed");
            handler.connection_closed(address, &reason);
        });

        let mut readers = self.readers.lock();
        readers.retain(|handle| !handle.is_finished());
        readers.push(task);
    }

    /// Writes a frame to the member at `address`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if there is no live connection or the write
    /// fails.
    pub async fn send(&self, address: SocketAddr, frame: &Frame) -> Result<()> {
        let connection = self.get(&address).ok_or_else(|| {
            HazelcastError::ConnectionLost(format!("no live connection to {}", address))
        })?;
        connection.send(frame).await
    }

    /// Closes the connection to `address`. Returns false if there was none.
    pub fn close(&self, address: &SocketAddr) -> bool {
        match self.connections.read().get(address) {
            Some(connection) => connection.close(),
            None => false,
        }
    }

    /// Pings idle connections and closes silent ones until shutdown.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let connections = Arc::clone(&self.connections);
        let heartbeat_interval = self.config.network().heartbeat_interval();
        let heartbeat_timeout = self.config.network().heartbeat_timeout();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(heartbeat_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot: Vec<Arc<Connection>> =
                            connections.read().values().cloned().collect();
                        for connection in snapshot {
                            if connection.silent_for() >= heartbeat_timeout {
                                tracing::warn!(
                                    id = %connection.id(),
                                    address = %connection.address(),
                                    "no traffic within heartbeat timeout, closing"
                                );
                                connection.close();
                                continue;
                            }
                            if connection.idle_for() >= heartbeat_interval {
                                let mut ping = ClientPingCodec.encode_request();
                                ping.set_correlation_id(HEARTBEAT_CORRELATION_ID);
                                if let Err(e) = connection.send(&ping).await {
                                    tracing::warn!(
                                        address = %connection.address(),
                                        error = %e,
                                        "heartbeat send failed"
                                    );
                                }
                            }
                        }
                    }
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("heartbeat task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Closes every connection and waits for their reader tasks to report.
    #[instrument(name = "connection_pool.shutdown", skip(self))]
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let connections: Vec<Arc<Connection>> =
            self.connections.read().values().cloned().collect();
        tracing::debug!(connection_count = connections.len(), "closing all connections");
        for connection in &connections {
            connection.close();
        }

        let readers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.readers.lock());
        for reader in readers {
            if let Err(e) = reader.await {
                tracing::warn!(error = %e, "reader task failed");
            }
        }
        tracing::info!("connection pool shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hazelcast_core::protocol::codecs::response;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct Recorder {
        frames: mpsc::UnboundedSender<Frame>,
        closed: mpsc::UnboundedSender<String>,
    }

    impl InboundHandler for Recorder {
        fn handle_frame(&self, _address: SocketAddr, frame: Frame) {
            let _ = self.frames.send(frame);
        }

        fn connection_closed(&self, _address: SocketAddr, reason: &str) {
            let _ = self.closed.send(reason.to_string());
        }
    }

    fn recorder() -> (
        Arc<Recorder>,
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (frames, frames_rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = mpsc::unbounded_channel();
        (Arc::new(Recorder { frames, closed }), frames_rx, closed_rx)
    }

    /// Accepts one connection, checks the preamble and answers the
    /// authentication request with `status`.
    async fn member(
        status: AuthenticationStatus,
    ) -> (SocketAddr, JoinHandle<FramedWrite<OwnedWriteHalf, FrameCodec>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut preamble = [0u8; 3];
            socket.read_exact(&mut preamble).await.unwrap();
            assert_eq!(&preamble, CLIENT_PROTOCOL_PREAMBLE);

            let (read_half, write_half) = socket.into_split();
            let mut reader = FramedRead::new(read_half, FrameCodec::new());
            let mut writer = FramedWrite::new(write_half, FrameCodec::new());
            let request = reader.next().await.unwrap().unwrap();
            let mut reply = AuthenticationResponse {
                status,
                address: None,
                uuid: Some("member-uuid".to_string()),
                owner_uuid: Some("owner-uuid".to_string()),
            }
            .encode();
            reply.set_correlation_id(request.correlation_id());
            writer.send(&reply).await.unwrap();
            tokio::spawn(async move { while reader.next().await.is_some() {} });
            writer
        });
        (address, handle)
    }

    fn pool() -> ConnectionPool {
        let config = ClientConfig::builder()
            .connection_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        ConnectionPool::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_connect_authenticates_and_pools() {
        let (address, member) = member(AuthenticationStatus::Authenticated).await;
        let pool = pool();
        let mut events = pool.subscribe();
        let (handler, _, _) = recorder();

        let connection = pool.connect(address, handler.clone()).await.unwrap();
        assert_eq!(connection.member_uuid(), Some("member-uuid"));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.client_uuid().as_deref(), Some("member-uuid"));
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::Connected { address: a, .. } if a == address
        ));

        let again = pool.connect(address, handler).await.unwrap();
        assert_eq!(again.id(), connection.id());
        drop(member);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let (address, _member) = member(AuthenticationStatus::CredentialsFailed).await;
        let pool = pool();
        let (handler, _, _) = recorder();

        let err = pool.connect(address, handler).await.unwrap_err();
        assert!(matches!(err, HazelcastError::Authentication(_)));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_reader_delivers_frames_and_reports_close_once() {
        let (address, member) = member(AuthenticationStatus::Authenticated).await;
        let pool = pool();
        let mut events = pool.subscribe();
        let (handler, mut frames, mut closed) = recorder();
        pool.connect(address, handler).await.unwrap();

        let mut writer = member.await.unwrap();
        let mut pushed = response::integer(7);
        pushed.set_correlation_id(99);
        writer.send(&pushed).await.unwrap();

        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.correlation_id(), 99);

        drop(writer);
        let reason = closed.recv().await.unwrap();
        assert_eq!(reason, "closed by member");
        assert!(pool.get(&address).is_none());
        assert!(closed.try_recv().is_err());

        let _connected = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::Disconnected { .. }
        ));
    }

    #[tokio::test]
    async fn test_reader_of_already_closed_connection_exits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let stream = TcpStream::connect(address).await.unwrap();
        let (_peer, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let reader = FramedRead::new(read_half, FrameCodec::new());
        let writer = FramedWrite::new(write_half, FrameCodec::new());

        let connection = Arc::new(Connection::new(address, None, writer));
        assert!(connection.close());
        let signal = connection.closed_signal();

        let pool = pool();
        let (handler, _frames, mut closed) = recorder();
        pool.spawn_reader(connection, reader, signal, handler);
        let reason = timeout(Duration::from_secs(2), closed.recv())
            .await
            .expect("reader kept waiting on a closed connection")
            .unwrap();
        assert_eq!(reason, "closed by client");
    }

    #[tokio::test]
    async fn test_send_without_connection_is_connection_lost() {
        let pool = pool();
        let address: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let err = pool
            .send(address, &ClientPingCodec.encode_request())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let (address, _member) = member(AuthenticationStatus::Authenticated).await;
        let pool = pool();
        let (handler, _, mut closed) = recorder();
        pool.connect(address, handler.clone()).await.unwrap();

        pool.shutdown().await;
        assert!(pool.is_shutdown());
        assert!(pool.is_empty());
        assert_eq!(closed.recv().await.unwrap(), "closed by client");

        let err = pool.connect(address, handler).await.unwrap_err();
        assert!(matches!(err, HazelcastError::Connection(_)));
    }
}
