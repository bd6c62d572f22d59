//! Client startup, lifecycle and connectivity against a mock member.

mod common;

use std::time::Duration;

use common::{client_for, config_for, MockMember};
use hazelcast_client::{
    ClusterView, ConnectionEvent, HazelcastClient, HazelcastError, LifecycleEvent,
};
use hazelcast_core::protocol::codecs::lock::LockForceUnlockCodec;
use hazelcast_core::protocol::{CLIENT_AUTHENTICATION, CLIENT_GET_PARTITIONS};
use tokio::sync::broadcast;

async fn next<T: Clone>(rx: &mut broadcast::Receiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event")
        .expect("channel closed")
}

#[tokio::test]
async fn test_start_authenticates_and_loads_partitions() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;

    assert!(client.is_running());
    assert_eq!(client.connection_count(), 1);
    assert!(client.client_uuid().is_some());
    assert_eq!(client.cluster_name(), "dev");
    assert_eq!(member.request_count(CLIENT_AUTHENTICATION), 1);
    assert!(member.request_count(CLIENT_GET_PARTITIONS) >= 1);

    let table = client.partition_table();
    assert_eq!(table.partition_count(), common::PARTITION_COUNT);
    assert_eq!(table.current_owner(0), Some(member.address()));
}

#[tokio::test]
async fn test_rejected_credentials_fail_start() {
    let member = MockMember::start().await;
    member.reject_authentication();
    common::init_tracing();
    let config = config_for(&[member.address()])
        .credentials("admin", "wrong")
        .build()
        .unwrap();

    let err = HazelcastClient::new(config).await.unwrap_err();
    assert!(matches!(err, HazelcastError::Authentication(_)), "got {err}");
}

#[tokio::test]
async fn test_falls_through_unreachable_addresses() {
    let member = MockMember::start().await;
    common::init_tracing();
    let config = config_for(&["127.0.0.1:1".parse().unwrap(), member.address()])
        .connection_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let client = HazelcastClient::new(config).await.unwrap();
    assert_eq!(client.connection_count(), 1);
}

#[tokio::test]
async fn test_shutdown_lifecycle_events() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;
    let mut lifecycle = client.subscribe_lifecycle();

    client.shutdown().await.unwrap();

    assert_eq!(next(&mut lifecycle).await, LifecycleEvent::ShuttingDown);
    assert_eq!(next(&mut lifecycle).await, LifecycleEvent::ClientDisconnected);
    assert_eq!(next(&mut lifecycle).await, LifecycleEvent::Shutdown);
}

#[tokio::test]
async fn test_reconnects_after_member_drops_connection() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;
    let mut connections = client.subscribe_connections();
    let mut lifecycle = client.subscribe_lifecycle();

    member.drop_connections();
    match next(&mut connections).await {
        ConnectionEvent::Disconnected { address, .. } => assert_eq!(address, member.address()),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(next(&mut lifecycle).await, LifecycleEvent::ClientDisconnected);

    client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap();
    match next(&mut connections).await {
        ConnectionEvent::Connected { address, .. } => assert_eq!(address, member.address()),
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(next(&mut lifecycle).await, LifecycleEvent::ClientConnected);
    assert_eq!(client.connection_count(), 1);
    assert_eq!(member.accepted_connections(), 2);
}
