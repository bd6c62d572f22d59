//! Single authenticated connection to a cluster member.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::SinkExt;
use hazelcast_core::protocol::{Frame, FrameCodec};
use hazelcast_core::{HazelcastError, Result};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::codec::FramedWrite;

/// Correlation id carried by heartbeat pings. Invocations start at 1, so
/// ping responses never complete an invocation.
pub const HEARTBEAT_CORRELATION_ID: i64 = 0;

type FrameWriter = FramedWrite<OwnedWriteHalf, FrameCodec>;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live, authenticated connection to one member.
///
/// The read half is owned by the connection's reader task. Writes from any
/// number of tasks are serialised by an async writer lock.
pub struct Connection {
    id: ConnectionId,
    address: SocketAddr,
    member_uuid: Option<String>,
    writer: AsyncMutex<FrameWriter>,
    alive: AtomicBool,
    closed: watch::Sender<bool>,
    created_at: Instant,
    last_read_at: Mutex<Instant>,
    last_write_at: Mutex<Instant>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("member_uuid", &self.member_uuid)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(
        address: SocketAddr,
        member_uuid: Option<String>,
        writer: FrameWriter,
    ) -> Self {
        let now = Instant::now();
        let (closed, _) = watch::channel(false);
        Self {
            id: ConnectionId::new(),
            address,
            member_uuid,
            writer: AsyncMutex::new(writer),
            alive: AtomicBool::new(true),
            closed,
            created_at: now,
            last_read_at: Mutex::new(now),
            last_write_at: Mutex::new(now),
        }
    }

    /// Returns the connection's unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address of this connection.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the uuid the member reported during authentication.
    pub fn member_uuid(&self) -> Option<&str> {
        self.member_uuid.as_deref()
    }

    /// Returns when this connection was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns true until the connection is closed from either side.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Time since a frame was last received.
    pub fn silent_for(&self) -> Duration {
        self.last_read_at.lock().elapsed()
    }

    /// Time since a frame was last written.
    pub fn idle_for(&self) -> Duration {
        self.last_write_at.lock().elapsed()
    }

    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLost` if the connection is closed or the write
    /// fails. A failed write closes the connection.
    pub async fn send(&self, frame: &Frame) -> Result<()> {
        if !self.is_alive() {
            return Err(HazelcastError::ConnectionLost(format!(
                "connection {} to {} is closed",
                self.id, self.address
            )));
        }

        let mut writer = self.writer.lock().await;
        match writer.send(frame).await {
            Ok(()) => {
                *self.last_write_at.lock() = Instant::now();
                Ok(())
            }
            Err(e) => {
                drop(writer);
                self.close();
                Err(HazelcastError::ConnectionLost(format!(
                    "write to {} failed: {}",
                    self.address, e
                )))
            }
        }
    }

    /// Closes the connection. The reader task notices, removes the
    /// connection from its pool and reports the loss.
    ///
    /// Returns false if the connection was already closed.
    pub fn close(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::AcqRel);
        if was_alive {
            self.closed.send_replace(true);
        }
        was_alive
    }

    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub(crate) fn mark_closed(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub(crate) fn touch_read(&self) {
        *self.last_read_at.lock() = Instant::now();
    }

    /// Shuts down the write half so the member sees the close.
    pub(crate) async fn shutdown_writer(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.get_mut().shutdown().await {
            tracing::debug!(id = %self.id, error = %e, "error shutting down writer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazelcast_core::protocol::codecs::client::ClientPingCodec;
    use hazelcast_core::protocol::OperationCodec;
    use tokio::net::{TcpListener, TcpStream};

    async fn connected_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let client = TcpStream::connect(address).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (_, write_half) = client.into_split();
        let connection = Connection::new(
            address,
            Some("member-1".to_string()),
            FramedWrite::new(write_half, FrameCodec::new()),
        );
        (connection, server)
    }

    #[test]
    fn test_connection_id_uniqueness() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.value() > id1.value());
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId(42).to_string(), "conn-42");
    }

    #[tokio::test]
    async fn test_send_writes_whole_frame() {
        use tokio::io::AsyncReadExt;

        let (connection, mut server) = connected_pair().await;
        let ping = ClientPingCodec.encode_request();
        connection.send(&ping).await.unwrap();

        let mut buf = vec![0u8; ping.len()];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, ping.as_bytes());
        assert_eq!(connection.member_uuid(), Some("member-1"));
    }

    #[tokio::test]
    async fn test_send_after_close_is_connection_lost() {
        let (connection, _server) = connected_pair().await;
        let mut signal = connection.closed_signal();

        assert!(connection.close());
        assert!(!connection.close());
        assert!(!connection.is_alive());
        signal.changed().await.unwrap();
        assert!(*signal.borrow());

        let err = connection
            .send(&ClientPingCodec.encode_request())
            .await
            .unwrap_err();
        assert!(matches!(err, HazelcastError::ConnectionLost(_)));
    }
}
