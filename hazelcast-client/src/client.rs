//! Hazelcast client entry point.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use hazelcast_core::protocol::codecs::client::{
    ClientFetchClassDefinitionCodec, ClientGetPartitionsCodec,
};
use hazelcast_core::protocol::{CodecRegistry, Frame, OperationCodec};
use hazelcast_core::serialization::{
    ClassDefinition, ClassDefinitionSource, ClassKey, Data, FactoryRegistry, FromData,
    SchemaRegistry, SerializationService, ToData,
};
use hazelcast_core::{HazelcastError, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::instrument;

use crate::cluster::{ClusterView, PartitionTable};
use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionPool};
use crate::invocation::InvocationService;
use crate::listener::{
    EventDispatcher, EventHandler, LifecycleEvent, RegistrationId, ReregistrationNeeded,
};

/// Builds the add-listener request for a registration id.
type RequestBuilder = Arc<dyn Fn(&str) -> Frame + Send + Sync>;

/// The main entry point for talking to a Hazelcast cluster.
///
/// Cloning is cheap; every clone drives the same connections, pending table
/// and registrations.
///
/// # Example
///
/// ```ignore
/// use hazelcast_client::{ClientConfig, HazelcastClient};
/// use hazelcast_core::protocol::codecs::map::{MapGetCodec, MapPutCodec};
///
/// let config = ClientConfig::builder()
///     .add_address("127.0.0.1:5701".parse()?)
///     .build()?;
/// let client = HazelcastClient::new(config).await?;
///
/// let key = client.to_data("user-1")?;
/// let value = client.to_data(&42i32)?;
/// let put = MapPutCodec { name: "users", key: &key, value: &value, thread_id: 1, ttl_millis: -1 };
/// client.invoke_codec(&put).await?;
///
/// let get = MapGetCodec { name: "users", key: &key, thread_id: 1 };
/// let stored = client.invoke_codec(&get).await?;
/// let age: i32 = client.to_object(&stored.unwrap()).await?;
///
/// client.shutdown().await?;
/// ```
#[derive(Debug, Clone)]
pub struct HazelcastClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Arc<ClientConfig>,
    pool: Arc<ConnectionPool>,
    invocation: InvocationService,
    partitions: Arc<PartitionTable>,
    dispatcher: Arc<EventDispatcher>,
    serialization: SerializationService,
    listener_requests: Mutex<HashMap<RegistrationId, RequestBuilder>>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for ClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientInner")
            .field("cluster_name", &self.config.cluster_name())
            .field("connections", &self.pool.len())
            .field("invocation", &self.invocation)
            .field("registrations", &self.dispatcher.len())
            .field("running", &self.running.load(Ordering::Acquire))
            .finish()
    }
}

/// Fetches unknown portable class definitions from the cluster.
struct ClusterSchemaSource {
    inner: Weak<ClientInner>,
}

#[async_trait]
impl ClassDefinitionSource for ClusterSchemaSource {
    async fn fetch(&self, key: ClassKey) -> Result<Option<ClassDefinition>> {
        let inner = self
            .inner
            .upgrade()
            .ok_or_else(|| HazelcastError::Connection("client is shut down".to_string()))?;
        tracing::debug!(key = %key, "fetching class definition from cluster");
        inner
            .invocation
            .invoke_codec(&ClientFetchClassDefinitionCodec { key })
            .await
    }
}

impl HazelcastClient {
    /// Creates a new client and connects to the cluster.
    ///
    /// Connects to the first reachable configured address, loads the
    /// partition table and starts the heartbeat, partition refresh and
    /// listener re-registration tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No configured address is reachable
    /// - The cluster rejects the credentials
    #[instrument(name = "client.start", skip(config), fields(cluster = %config.cluster_name()))]
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let config = Arc::new(config);
        let (lifecycle, _) = broadcast::channel(16);

        let inner = Arc::new_cyclic(|weak: &Weak<ClientInner>| {
            let registry = Arc::new(SchemaRegistry::new(
                config.serialization().schema_fetch_timeout(),
            ));
            registry.set_source(Arc::new(ClusterSchemaSource {
                inner: weak.clone(),
            }));
            let serialization = SerializationService::new(
                registry,
                config.serialization().portable_version(),
                FactoryRegistry::new(),
            );

            let pool = Arc::new(ConnectionPool::new(Arc::clone(&config)));
            let partitions = Arc::new(PartitionTable::new());
            let dispatcher = Arc::new(EventDispatcher::new());
            let invocation = InvocationService::new(
                Arc::clone(&config),
                CodecRegistry::standard(),
                Arc::clone(&pool),
                Arc::clone(&partitions) as Arc<dyn ClusterView>,
                Arc::clone(&dispatcher),
            );

            ClientInner {
                config: Arc::clone(&config),
                pool,
                invocation,
                partitions,
                dispatcher,
                serialization,
                listener_requests: Mutex::new(HashMap::new()),
                lifecycle,
                tasks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
            }
        });

        let client = Self { inner };
        client.inner.fire(LifecycleEvent::Starting);
        if let Err(e) = client.start().await {
            tracing::warn!(error = %e, "client failed to start");
            client.inner.pool.shutdown().await;
            return Err(e);
        }
        Ok(client)
    }

    async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        let connection = inner.invocation.connect_any().await?;
        tracing::info!(address = %connection.address(), "connected to Hazelcast cluster");
        inner.fire(LifecycleEvent::ClientConnected);

        if let Err(e) = inner.refresh_partitions().await {
            tracing::warn!(error = %e, "initial partition table refresh failed");
        }

        let weak = Arc::downgrade(inner);
        let tasks = vec![
            inner.pool.spawn_heartbeat(),
            spawn_partition_refresh(weak.clone(), inner.config.partition_refresh_interval()),
            spawn_reregistration(weak.clone(), inner.dispatcher.subscribe_reregistration()),
            spawn_connection_watch(weak, inner.pool.subscribe()),
        ];
        inner.tasks.lock().extend(tasks);

        inner.running.store(true, Ordering::Release);
        inner.fire(LifecycleEvent::Started);
        Ok(())
    }

    /// Sends a request frame and returns the response frame.
    ///
    /// A `partition_key` routes the request to the member owning that key.
    ///
    /// # Errors
    ///
    /// Returns `Connection` once the client is shut down, otherwise whatever
    /// the invocation fails with.
    pub async fn invoke(&self, request: Frame, partition_key: Option<&Data>) -> Result<Frame> {
        self.ensure_running()?;
        self.inner.invocation.invoke(request, partition_key).await
    }

    /// Encodes, sends and decodes one operation.
    pub async fn invoke_codec<C: OperationCodec>(&self, codec: &C) -> Result<C::Response> {
        self.ensure_running()?;
        self.inner.invocation.invoke_codec(codec).await
    }

    /// Sends a request frame to one member, connecting first if needed.
    ///
    /// Used for requests bound to a member, such as committing a
    /// transaction on the member that created it.
    pub async fn invoke_on(&self, address: SocketAddr, request: Frame) -> Result<Frame> {
        self.ensure_running()?;
        self.inner.invocation.invoke_on(address, request).await
    }

    /// Serializes a value.
    pub fn to_data<T: ToData + ?Sized>(&self, value: &T) -> Result<Data> {
        self.inner.serialization.to_data(value)
    }

    /// Deserializes a value, fetching unknown portable class definitions
    /// from the cluster first.
    pub async fn to_object<T: FromData>(&self, data: &Data) -> Result<T> {
        self.inner.serialization.to_object(data).await
    }

    /// Returns the serialization service.
    pub fn serialization(&self) -> &SerializationService {
        &self.inner.serialization
    }

    /// Registers `handler` for events on `target` and adds the registration
    /// on a member.
    ///
    /// `request_fn` builds the add-listener request from the registration
    /// id. It is kept so the registration can be added again when its
    /// member is lost.
    ///
    /// # Errors
    ///
    /// Returns the error of the add-listener request; the local
    /// registration is removed again in that case.
    #[instrument(name = "client.add_listener", skip_all)]
    pub async fn add_listener<F, H>(
        &self,
        target: impl Into<String>,
        request_fn: F,
        handler: H,
    ) -> Result<RegistrationId>
    where
        F: Fn(&str) -> Frame + Send + Sync + 'static,
        H: EventHandler,
    {
        self.ensure_running()?;
        let inner = &self.inner;
        let id = inner.dispatcher.register(target, handler);
        let request_fn: RequestBuilder = Arc::new(request_fn);

        match inner.register_on_member(&id, &request_fn).await {
            Ok(member) => {
                inner.listener_requests.lock().insert(id.clone(), request_fn);
                tracing::debug!(registration_id = %id, member = %member, "listener added");
                Ok(id)
            }
            Err(e) => {
                inner.dispatcher.unregister(id.as_str());
                Err(e)
            }
        }
    }

    /// Removes a registration locally and sends `request` to the member it
    /// was added through.
    ///
    /// Returns false without contacting the cluster if `id` is unknown.
    pub async fn remove_listener(&self, id: &str, request: Frame) -> Result<bool> {
        let inner = &self.inner;
        let member = inner.dispatcher.member_of(id);
        inner.listener_requests.lock().remove(id);
        if !inner.dispatcher.unregister(id) {
            return Ok(false);
        }
        if !self.is_running() {
            return Ok(true);
        }

        let result = match member {
            Some(member) => inner.invocation.invoke_on(member, request).await,
            None => inner.invocation.invoke(request, None).await,
        };
        result.map(|_| true)
    }

    /// Reloads the partition table from the cluster and connects to owners
    /// that are not connected yet.
    pub async fn refresh_partitions(&self) -> Result<()> {
        self.ensure_running()?;
        self.inner.refresh_partitions().await
    }

    /// Returns the partition table used for routing.
    pub fn partition_table(&self) -> Arc<PartitionTable> {
        Arc::clone(&self.inner.partitions)
    }

    /// Subscribes to client lifecycle events.
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.lifecycle.subscribe()
    }

    /// Subscribes to connection open/close events.
    pub fn subscribe_connections(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.pool.subscribe()
    }

    /// Returns the number of invocations awaiting a response.
    pub fn pending_invocations(&self) -> usize {
        self.inner.invocation.pending_count()
    }

    /// Returns the number of live member connections.
    pub fn connection_count(&self) -> usize {
        self.inner.pool.len()
    }

    /// Returns the uuid the cluster assigned to this client.
    pub fn client_uuid(&self) -> Option<String> {
        self.inner.pool.client_uuid()
    }

    /// Returns the number of listener registrations.
    pub fn listener_count(&self) -> usize {
        self.inner.dispatcher.len()
    }

    /// Returns the cluster name this client is connected to.
    pub fn cluster_name(&self) -> &str {
        self.inner.config.cluster_name()
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns true between a successful start and shutdown.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Shuts down the client and closes all connections.
    ///
    /// Pending invocations fail, registrations are dropped and later calls
    /// fail with `Connection`. Calling it again does nothing.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!(cluster = %inner.config.cluster_name(), "shutting down Hazelcast client");
        inner.fire(LifecycleEvent::ShuttingDown);
        inner.running.store(false, Ordering::Release);

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *inner.tasks.lock());
        for task in tasks {
            task.abort();
        }
        inner.pool.shutdown().await;
        inner.dispatcher.clear();
        inner.listener_requests.lock().clear();

        inner.fire(LifecycleEvent::ClientDisconnected);
        inner.fire(LifecycleEvent::Shutdown);
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(HazelcastError::Connection("client is not running".to_string()))
        }
    }
}

impl ClientInner {
    fn fire(&self, event: LifecycleEvent) {
        tracing::info!(event = %event, "lifecycle event");
        let _ = self.lifecycle.send(event);
    }

    async fn refresh_partitions(&self) -> Result<()> {
        let ownership = self
            .invocation
            .invoke_codec(&ClientGetPartitionsCodec)
            .await?;
        self.partitions.update(&ownership)?;

        for member in self.partitions.members() {
            if self.pool.get(&member).is_some() {
                continue;
            }
            if let Err(e) = self
                .pool
                .connect(member, self.invocation.inbound_handler())
                .await
            {
                tracing::warn!(
                    member = %member,
                    error = %e,
                    "failed to connect to partition owner"
                );
            }
        }
        Ok(())
    }

    /// Sends the add-listener request for `id` to some member and binds the
    /// registration to it.
    async fn register_on_member(
        &self,
        id: &RegistrationId,
        request_fn: &RequestBuilder,
    ) -> Result<SocketAddr> {
        let connection = match self.pool.any() {
            Some(connection) => connection,
            None => self.invocation.connect_any().await?,
        };
        let member = connection.address();
        self.invocation
            .invoke_on(member, request_fn(id.as_str()))
            .await?;
        self.dispatcher.bind(id.as_str(), member);
        Ok(member)
    }

    async fn reregister(&self, needed: ReregistrationNeeded) {
        let retry = self.config.retry();
        for attempt in 0..=retry.max_retries() {
            let request_fn = match self
                .listener_requests
                .lock()
                .get(needed.registration_id.as_str())
            {
                Some(request_fn) => Arc::clone(request_fn),
                None => return,
            };
            match self.register_on_member(&needed.registration_id, &request_fn).await {
                Ok(member) => {
                    tracing::info!(
                        registration_id = %needed.registration_id,
                        target = %needed.target,
                        member = %member,
                        "listener re-registered"
                    );
                    return;
                }
                Err(e) => {
                    let backoff = retry.backoff(attempt);
                    tracing::warn!(
                        registration_id = %needed.registration_id,
                        attempt,
                        backoff = ?backoff,
                        error = %e,
                        "listener re-registration failed"
                    );
                    sleep(backoff).await;
                }
            }
        }
        tracing::warn!(
            registration_id = %needed.registration_id,
            "giving up on listener re-registration"
        );
    }
}

fn spawn_partition_refresh(inner: Weak<ClientInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if let Err(e) = inner.refresh_partitions().await {
                tracing::warn!(error = %e, "partition table refresh failed");
            }
        }
    })
}

fn spawn_reregistration(
    inner: Weak<ClientInner>,
    mut needed: broadcast::Receiver<ReregistrationNeeded>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match needed.recv().await {
                Ok(registration) => {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    inner.reregister(registration).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "re-registration requests lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Reports cluster-wide connectivity changes as lifecycle events.
fn spawn_connection_watch(
    inner: Weak<ClientInner>,
    mut events: broadcast::Receiver<ConnectionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut connected = true;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(inner) = inner.upgrade() else {
                break;
            };
            match event {
                ConnectionEvent::Connected { .. } if !connected => {
                    connected = true;
                    inner.fire(LifecycleEvent::ClientConnected);
                }
                ConnectionEvent::Disconnected { .. } if connected && inner.pool.is_empty() => {
                    connected = false;
                    inner.fire(LifecycleEvent::ClientDisconnected);
                }
                _ => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HazelcastClient>();
    }

    #[tokio::test]
    async fn test_new_fails_without_reachable_member() {
        let config = ClientConfig::builder()
            .add_address("127.0.0.1:1".parse().unwrap())
            .connection_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        assert!(HazelcastClient::new(config).await.is_err());
    }
}
