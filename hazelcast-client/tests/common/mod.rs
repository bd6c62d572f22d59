//! In-process mock cluster member for integration tests.
//!
//! Speaks the frame codec over a real `TcpListener` on `127.0.0.1:0`,
//! answers the client service requests itself and hands every other request
//! to a per-test responder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hazelcast_client::{ClientConfig, HazelcastClient};
use hazelcast_core::protocol::codecs::client::{
    Address, AuthenticationResponse, AuthenticationStatus, ClientFetchClassDefinitionCodec,
    ClientGetPartitionsCodec, PartitionOwnership,
};
use hazelcast_core::protocol::codecs::response;
use hazelcast_core::protocol::*;
use hazelcast_core::serialization::{ClassDefinition, ClassKey, Data};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

pub const PARTITION_COUNT: i32 = 271;

/// What the member does with one request.
pub enum Reply {
    /// Send this frame with the request's correlation id.
    Respond(Frame),
    /// Send these frames exactly as given.
    Raw(Vec<Frame>),
    /// Never answer.
    Silent,
    /// Close the connection the request arrived on.
    Close,
}

type Responder = Arc<dyn Fn(&Frame) -> Reply + Send + Sync>;

enum Command {
    Send(Frame),
    Close,
}

#[derive(Default)]
struct MemberState {
    address: Mutex<Option<SocketAddr>>,
    member_uuid: String,
    responder: Mutex<Option<Responder>>,
    requests: Mutex<Vec<Frame>>,
    partition_owner: Mutex<Option<SocketAddr>>,
    class_definitions: Mutex<HashMap<ClassKey, ClassDefinition>>,
    fetch_delay: Mutex<Duration>,
    store: Mutex<HashMap<(String, Vec<u8>), Data>>,
    connections: Mutex<Vec<mpsc::UnboundedSender<Command>>>,
    accepted: AtomicUsize,
    reject_auth: AtomicBool,
}

pub struct MockMember {
    address: SocketAddr,
    state: Arc<MemberState>,
    accept_task: JoinHandle<()>,
}

impl Drop for MockMember {
    fn drop(&mut self) {
        self.accept_task.abort();
        self.drop_connections();
    }
}

impl MockMember {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let state = Arc::new(MemberState {
            member_uuid: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        });
        *state.address.lock() = Some(address);

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(Arc::clone(&accept_state), socket));
            }
        });

        Self {
            address,
            state,
            accept_task,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Installs the handler for every request the member does not answer
    /// itself.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Frame) -> Reply + Send + Sync + 'static,
    {
        *self.state.responder.lock() = Some(Arc::new(responder));
    }

    pub fn clear_responder(&self) {
        *self.state.responder.lock() = None;
    }

    /// Reports every partition as owned by `owner` instead of this member.
    pub fn set_partition_owner(&self, owner: SocketAddr) {
        *self.state.partition_owner.lock() = Some(owner);
    }

    pub fn define_class(&self, definition: ClassDefinition) {
        self.state
            .class_definitions
            .lock()
            .insert(definition.key(), definition);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.state.fetch_delay.lock() = delay;
    }

    pub fn reject_authentication(&self) {
        self.state.reject_auth.store(true, Ordering::SeqCst);
    }

    pub fn requests_of(&self, message_type: u16) -> Vec<Frame> {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|f| f.message_type() == message_type)
            .cloned()
            .collect()
    }

    pub fn request_count(&self, message_type: u16) -> usize {
        self.requests_of(message_type).len()
    }

    pub fn accepted_connections(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` requests of `message_type` arrived.
    pub async fn wait_for_requests(&self, message_type: u16, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count(message_type) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("requests did not arrive");
    }

    /// Sends `frame` on every open connection.
    pub fn push(&self, frame: Frame) {
        self.state
            .connections
            .lock()
            .retain(|tx| tx.send(Command::Send(frame.clone())).is_ok());
    }

    /// Closes every open connection; the listener keeps accepting.
    pub fn drop_connections(&self) {
        for tx in self.state.connections.lock().drain(..) {
            let _ = tx.send(Command::Close);
        }
    }
}

async fn serve(state: Arc<MemberState>, mut socket: TcpStream) {
    let mut preamble = [0u8; 3];
    if socket.read_exact(&mut preamble).await.is_err() || &preamble != CLIENT_PROTOCOL_PREAMBLE {
        return;
    }

    let (read_half, write_half) = socket.into_split();
    let mut reader = FramedRead::new(read_half, FrameCodec::new());
    let mut writer = FramedWrite::new(write_half, FrameCodec::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.connections.lock().push(tx.clone());

    loop {
        tokio::select! {
            request = reader.next() => {
                let Some(Ok(request)) = request else {
                    break;
                };
                handle(&state, request, &tx);
            }
            command = rx.recv() => match command {
                Some(Command::Send(frame)) => {
                    if writer.send(&frame).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) | None => break,
            },
        }
    }
}

fn reply_to(request: &Frame, mut frame: Frame) -> Command {
    frame.set_correlation_id(request.correlation_id());
    Command::Send(frame)
}

fn handle(state: &Arc<MemberState>, request: Frame, tx: &mpsc::UnboundedSender<Command>) {
    state.requests.lock().push(request.clone());
    let own_address = state.address.lock().unwrap_or_else(|| ([127, 0, 0, 1], 0).into());

    match request.message_type() {
        CLIENT_AUTHENTICATION => {
            let status = if state.reject_auth.load(Ordering::SeqCst) {
                AuthenticationStatus::CredentialsFailed
            } else {
                AuthenticationStatus::Authenticated
            };
            let frame = AuthenticationResponse {
                status,
                address: Some(Address::from(own_address)),
                uuid: Some(state.member_uuid.clone()),
                owner_uuid: Some(state.member_uuid.clone()),
            }
            .encode();
            let _ = tx.send(reply_to(&request, frame));
        }
        CLIENT_PING => {
            let _ = tx.send(reply_to(&request, response::void()));
        }
        CLIENT_GET_PARTITIONS => {
            let owner = state.partition_owner.lock().unwrap_or(own_address);
            let frame = ClientGetPartitionsCodec::encode_response(&[PartitionOwnership {
                address: Address::from(owner),
                partitions: (0..PARTITION_COUNT).collect(),
            }]);
            let _ = tx.send(reply_to(&request, frame));
        }
        CLIENT_FETCH_CLASS_DEFINITION => {
            let definition = ClientFetchClassDefinitionCodec::decode_request(&request)
                .ok()
                .and_then(|key| state.class_definitions.lock().get(&key).cloned());
            let delay = *state.fetch_delay.lock();
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let frame = ClientFetchClassDefinitionCodec::encode_response(definition.as_ref());
                let _ = tx.send(reply_to(&request, frame));
            });
        }
        _ => {
            let responder = state.responder.lock().clone();
            let reply = match responder {
                Some(responder) => responder(&request),
                None => default_reply(state, &request),
            };
            match reply {
                Reply::Respond(frame) => {
                    let _ = tx.send(reply_to(&request, frame));
                }
                Reply::Raw(frames) => {
                    for frame in frames {
                        let _ = tx.send(Command::Send(frame));
                    }
                }
                Reply::Silent => {}
                Reply::Close => {
                    let _ = tx.send(Command::Close);
                }
            }
        }
    }
}

/// Map put/get against an in-memory store, success for everything else.
fn default_reply(state: &MemberState, request: &Frame) -> Reply {
    let mut reader = request.reader();
    match request.message_type() {
        MAP_PUT => {
            let name = reader.get_str().unwrap();
            let key = reader.get_data().unwrap();
            let value = reader.get_data().unwrap();
            let previous = state
                .store
                .lock()
                .insert((name, key.as_bytes().to_vec()), value);
            Reply::Respond(response::data(previous.as_ref()))
        }
        MAP_GET => {
            let name = reader.get_str().unwrap();
            let key = reader.get_data().unwrap();
            let value = state
                .store
                .lock()
                .get(&(name, key.as_bytes().to_vec()))
                .cloned();
            Reply::Respond(response::data(value.as_ref()))
        }
        MAP_REMOVE_ENTRY_LISTENER => Reply::Respond(response::boolean(true)),
        _ => Reply::Respond(response::void()),
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config pointing at `members` with timeouts short enough for tests.
pub fn config_for(members: &[SocketAddr]) -> hazelcast_client::ClientConfigBuilder {
    ClientConfig::builder()
        .addresses(members.iter().copied())
        .connection_timeout(Duration::from_secs(2))
        .invocation_timeout(Duration::from_secs(10))
        .retry(|r| {
            r.initial_backoff(Duration::from_millis(10))
                .max_backoff(Duration::from_millis(100))
                .max_retries(5)
        })
}

pub async fn client_for(member: &MockMember) -> HazelcastClient {
    init_tracing();
    let config = config_for(&[member.address()])
        .build()
        .expect("failed to build config");
    HazelcastClient::new(config)
        .await
        .expect("failed to create client")
}
