//! Request/response multiplexing over pooled connections.
//!
//! Every request gets a fresh correlation id and a pending entry holding a
//! oneshot completion slot. Reader tasks complete the slot when the
//! response arrives. Retries, routing and the overall timeout live inside
//! the invocation future.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use hazelcast_core::protocol::codecs::decode_error_response;
use hazelcast_core::protocol::{CodecRegistry, Frame, OperationCodec, RESPONSE_EXCEPTION};
use hazelcast_core::serialization::Data;
use hazelcast_core::{partition_id, HazelcastError, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::instrument;

use crate::cluster::ClusterView;
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionPool, InboundHandler, HEARTBEAT_CORRELATION_ID};
use crate::listener::EventDispatcher;

struct PendingInvocation {
    address: SocketAddr,
    operation: &'static str,
    completion: oneshot::Sender<Result<Frame>>,
}

/// State shared with the reader tasks.
struct Shared {
    pending: Mutex<HashMap<i64, PendingInvocation>>,
    dispatcher: Arc<EventDispatcher>,
}

impl InboundHandler for Shared {
    fn handle_frame(&self, address: SocketAddr, frame: Frame) {
        if frame.is_event() {
            self.dispatcher.dispatch(frame);
            return;
        }

        let correlation_id = frame.correlation_id();
        let pending = self.pending.lock().remove(&correlation_id);
        match pending {
            Some(pending) => {
                tracing::debug!(
                    correlation_id,
                    operation = pending.operation,
                    address = %address,
                    "completing invocation"
                );
                let result = if frame.message_type() == RESPONSE_EXCEPTION {
                    Err(decode_error_response(&frame))
                } else {
                    Ok(frame)
                };
                let _ = pending.completion.send(result);
            }
            None if correlation_id == HEARTBEAT_CORRELATION_ID => {
                tracing::trace!(address = %address, "heartbeat response");
            }
            None => {
                tracing::debug!(
                    correlation_id,
                    address = %address,
                    "dropping response with unknown correlation id"
                );
            }
        }
    }

    fn connection_closed(&self, address: SocketAddr, reason: &str) {
        let failed: Vec<(i64, PendingInvocation)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<i64> = pending
                .iter()
                .filter(|(_, p)| p.address == address)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|p| (id, p)))
                .collect()
        };

        if !failed.is_empty() {
            tracing::warn!(
                address = %address,
                count = failed.len(),
                reason,
                "failing invocations of closed connection"
            );
        }
        for (correlation_id, pending) in failed {
            let _ = pending.completion.send(Err(HazelcastError::ConnectionLost(format!(
                "connection to {} closed ({}) while awaiting correlation id {}",
                address, reason, correlation_id
            ))));
        }

        self.dispatcher.connection_lost(address);
    }
}

/// Removes its pending entry when the invocation attempt ends for any
/// reason, including the caller dropping the future.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<i64, PendingInvocation>>,
    correlation_id: i64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.correlation_id);
    }
}

/// Sends requests and matches their responses.
pub struct InvocationService {
    shared: Arc<Shared>,
    registry: CodecRegistry,
    pool: Arc<ConnectionPool>,
    cluster: Arc<dyn ClusterView>,
    config: Arc<ClientConfig>,
    next_correlation_id: AtomicI64,
}

impl std::fmt::Debug for InvocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationService")
            .field("pending", &self.pending_count())
            .field("next_correlation_id", &self.next_correlation_id)
            .finish()
    }
}

impl InvocationService {
    /// Creates a service routing through `pool` by the ownership in `cluster`.
    pub fn new(
        config: Arc<ClientConfig>,
        registry: CodecRegistry,
        pool: Arc<ConnectionPool>,
        cluster: Arc<dyn ClusterView>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(HashMap::new()),
                dispatcher,
            }),
            registry,
            pool,
            cluster,
            config,
            next_correlation_id: AtomicI64::new(HEARTBEAT_CORRELATION_ID + 1),
        }
    }

    /// Returns the handler new connections must report their frames to.
    pub fn inbound_handler(&self) -> Arc<dyn InboundHandler> {
        Arc::clone(&self.shared) as Arc<dyn InboundHandler>
    }

    /// Returns the number of invocations awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Returns the codec registry.
    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Sends `frame` and returns the response frame.
    ///
    /// With a `partition_key` the request goes to the partition owner when a
    /// connection to it exists; otherwise to any live connection.
    ///
    /// # Errors
    ///
    /// - `Server` if the member answered with an error response
    /// - `ConnectionLost` if a non-retryable request lost its connection
    /// - `OperationTimeout` if the invocation timeout expired or a retryable
    ///   request ran out of retries
    pub async fn invoke(&self, frame: Frame, partition_key: Option<&Data>) -> Result<Frame> {
        let partition_hash = partition_key.map(Data::partition_hash);
        self.invoke_hashed(frame, partition_hash).await
    }

    /// Like [`invoke`](Self::invoke), routing by a precomputed partition
    /// hash.
    #[instrument(
        name = "invocation.invoke",
        skip_all,
        fields(operation = self.registry.name_of(&frame))
    )]
    pub async fn invoke_hashed(
        &self,
        mut frame: Frame,
        partition_hash: Option<i32>,
    ) -> Result<Frame> {
        let partition_count = self.cluster.partition_count();
        let partition = match partition_hash {
            Some(hash) if partition_count > 0 => {
                let id = partition_id(hash, partition_count);
                frame.set_partition_id(id);
                Some(id)
            }
            _ => None,
        };

        let invocation_timeout = self.config.invocation_timeout();
        let attempts = AtomicU32::new(0);
        match timeout(invocation_timeout, self.invoke_with_retry(&frame, partition, &attempts))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                let attempts = attempts.load(Ordering::Relaxed);
                tracing::warn!(attempts, timeout = ?invocation_timeout, "invocation timed out");
                Err(HazelcastError::OperationTimeout {
                    attempts,
                    reason: format!("no response within {:?}", invocation_timeout),
                })
            }
        }
    }

    /// Encodes `codec`'s request, invokes it on the codec's partition and
    /// decodes the response.
    pub async fn invoke_codec<C: OperationCodec>(&self, codec: &C) -> Result<C::Response> {
        let response = self
            .invoke_hashed(codec.encode_request(), codec.partition_hash())
            .await?;
        C::decode_response(&response)
    }

    /// Sends `frame` to the member at `address` once, connecting first if
    /// needed. Used for member-scoped requests such as listener
    /// registration.
    pub async fn invoke_on(&self, address: SocketAddr, frame: Frame) -> Result<Frame> {
        let invocation_timeout = self.config.invocation_timeout();
        let attempt = async {
            let connection = self.pool.connect(address, self.inbound_handler()).await?;
            self.send_on(&connection, &frame).await
        };
        timeout(invocation_timeout, attempt)
            .await
            .map_err(|_| HazelcastError::OperationTimeout {
                attempts: 1,
                reason: format!("no response from {} within {:?}", address, invocation_timeout),
            })?
    }

    async fn invoke_with_retry(
        &self,
        frame: &Frame,
        partition: Option<i32>,
        attempts: &AtomicU32,
    ) -> Result<Frame> {
        let retryable = self.registry.is_retryable(frame);
        let retry = self.config.retry();
        loop {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let result = match self.target(partition).await {
                Ok(connection) => self.send_on(&connection, frame).await,
                Err(e) => Err(e),
            };
            match result {
                Err(HazelcastError::ConnectionLost(reason)) if retryable => {
                    if self.pool.is_shutdown() {
                        return Err(HazelcastError::Connection(
                            "client is shut down".to_string(),
                        ));
                    }
                    if attempt > retry.max_retries() {
                        tracing::warn!(attempts = attempt, reason = %reason, "retries exhausted");
                        return Err(HazelcastError::OperationTimeout {
                            attempts: attempt,
                            reason: format!("retries exhausted: {}", reason),
                        });
                    }
                    let backoff = retry.backoff(attempt - 1);
                    tracing::warn!(
                        attempt,
                        backoff = ?backoff,
                        reason = %reason,
                        "connection lost, retrying invocation"
                    );
                    sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    /// Picks the connection for one attempt: the partition owner, then any
    /// live connection, then a fresh connection to a known member.
    async fn target(&self, partition: Option<i32>) -> Result<Arc<Connection>> {
        if let Some(owner) = partition.and_then(|id| self.cluster.current_owner(id)) {
            if let Some(connection) = self.pool.get(&owner) {
                return Ok(connection);
            }
            tracing::debug!(owner = %owner, "partition owner not connected");
        }
        if let Some(connection) = self.pool.any() {
            return Ok(connection);
        }
        self.connect_any().await.map_err(|e| match e {
            HazelcastError::ConnectionLost(_) => e,
            other => HazelcastError::ConnectionLost(other.to_string()),
        })
    }

    /// Connects to the first reachable member, trying the cluster's members
    /// before the configured addresses.
    ///
    /// # Errors
    ///
    /// Returns the last connection error, or `Connection` if no address is
    /// known at all.
    pub async fn connect_any(&self) -> Result<Arc<Connection>> {
        let mut candidates = self.cluster.members();
        for address in self.config.network().addresses() {
            if !candidates.contains(address) {
                candidates.push(*address);
            }
        }

        let mut last_error = None;
        for address in candidates {
            match self.pool.connect(address, self.inbound_handler()).await {
                Ok(connection) => return Ok(connection),
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "failed to connect to member");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            HazelcastError::Connection("no member addresses configured".to_string())
        }))
    }

    async fn send_on(&self, connection: &Connection, frame: &Frame) -> Result<Frame> {
        let address = connection.address();
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        let mut request = frame.clone();
        request.set_correlation_id(correlation_id);

        let (completion, response) = oneshot::channel();
        self.shared.pending.lock().insert(
            correlation_id,
            PendingInvocation {
                address,
                operation: self.registry.name_of(frame),
                completion,
            },
        );
        let _guard = PendingGuard {
            pending: &self.shared.pending,
            correlation_id,
        };

        // A connection that died before the entry was inserted was already
        // swept by connection_closed.
        if !connection.is_alive() {
            return Err(HazelcastError::ConnectionLost(format!(
                "connection to {} closed before send",
                address
            )));
        }

        tracing::debug!(correlation_id, address = %address, "sending request");
        connection.send(&request).await?;
        response.await.unwrap_or_else(|_| {
            Err(HazelcastError::ConnectionLost(format!(
                "invocation {} to {} abandoned",
                correlation_id, address
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazelcast_core::protocol::codecs::{encode_error_response, response};

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            dispatcher: Arc::new(EventDispatcher::new()),
        })
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn register(
        shared: &Shared,
        id: i64,
        address: SocketAddr,
    ) -> oneshot::Receiver<Result<Frame>> {
        let (completion, rx) = oneshot::channel();
        shared.pending.lock().insert(
            id,
            PendingInvocation {
                address,
                operation: "test",
                completion,
            },
        );
        rx
    }

    #[tokio::test]
    async fn test_response_completes_matching_invocation() {
        let shared = shared();
        let rx = register(&shared, 7, addr(5701));

        let mut frame = response::boolean(true);
        frame.set_correlation_id(7);
        shared.handle_frame(addr(5701), frame);

        let frame = rx.await.unwrap().unwrap();
        assert_eq!(frame.correlation_id(), 7);
        assert!(shared.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_error_response_completes_with_server_error() {
        let shared = shared();
        let rx = register(&shared, 3, addr(5701));

        let mut frame = encode_error_response(9, "IllegalStateException", Some("nope"));
        frame.set_correlation_id(3);
        shared.handle_frame(addr(5701), frame);

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, HazelcastError::Server { code: 9, .. }));
    }

    #[tokio::test]
    async fn test_unknown_correlation_id_is_dropped() {
        let shared = shared();
        let _rx = register(&shared, 1, addr(5701));

        let mut frame = response::void();
        frame.set_correlation_id(42);
        shared.handle_frame(addr(5701), frame);

        assert_eq!(shared.pending.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_closed_fails_only_its_invocations() {
        let shared = shared();
        let lost = register(&shared, 1, addr(5701));
        let kept = register(&shared, 2, addr(5702));

        shared.connection_closed(addr(5701), "closed by member");

        let err = lost.await.unwrap().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(shared.pending.lock().len(), 1);
        drop(kept);
    }

    #[test]
    fn test_guard_removes_entry() {
        let shared = shared();
        let _rx = register(&shared, 5, addr(5701));
        {
            let _guard = PendingGuard {
                pending: &shared.pending,
                correlation_id: 5,
            };
        }
        assert!(shared.pending.lock().is_empty());
    }
}
