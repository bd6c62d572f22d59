//! Invocation behaviour against an in-process mock member.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{client_for, config_for, MockMember, Reply, PARTITION_COUNT};
use hazelcast_client::{HazelcastClient, HazelcastError};
use hazelcast_core::{name_partition_hash, partition_id};
use hazelcast_core::protocol::codecs::lock::LockForceUnlockCodec;
use hazelcast_core::protocol::codecs::map::{MapGetCodec, MapPutCodec};
use hazelcast_core::protocol::codecs::transaction::{
    TransactionCommitCodec, TransactionCreateCodec, TransactionType,
};
use hazelcast_core::protocol::codecs::{encode_error_response, response};
use hazelcast_core::protocol::{
    OperationCodec, LOCK_FORCE_UNLOCK, MAP_GET, MAP_PUT, TRANSACTION_COMMIT, TRANSACTION_CREATE,
};
use hazelcast_core::serialization::Data;

fn key(bytes: &[u8]) -> Data {
    Data::new(-12, 0, bytes)
}

#[tokio::test]
async fn test_force_unlock_reaches_member() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;

    client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap();

    let requests = member.requests_of(LOCK_FORCE_UNLOCK);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].reader().get_str().unwrap(), "myLock");
    let expected = partition_id(name_partition_hash("myLock"), PARTITION_COUNT);
    assert_eq!(requests[0].partition_id(), expected);
    assert_eq!(client.pending_invocations(), 0);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_put_then_get() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;
    let k = key(b"k1");
    let v = key(b"v1");

    let previous = client
        .invoke_codec(&MapPutCodec {
            name: "m",
            key: &k,
            value: &v,
            thread_id: 1,
            ttl_millis: -1,
        })
        .await
        .unwrap();
    assert_eq!(previous, None);

    let stored = client
        .invoke_codec(&MapGetCodec {
            name: "m",
            key: &k,
            thread_id: 1,
        })
        .await
        .unwrap();
    assert_eq!(stored, Some(v));

    let expected = partition_id(k.partition_hash(), PARTITION_COUNT);
    assert_eq!(member.requests_of(MAP_GET)[0].partition_id(), expected);
}

#[tokio::test]
async fn test_error_response_is_server_error() {
    let member = MockMember::start().await;
    member.set_responder(|_| {
        Reply::Respond(encode_error_response(
            17,
            "IllegalMonitorStateException",
            Some("lock not held"),
        ))
    });
    let client = client_for(&member).await;

    let err = client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap_err();
    match err {
        HazelcastError::Server {
            code,
            class_name,
            message,
        } => {
            assert_eq!(code, 17);
            assert_eq!(class_name, "IllegalMonitorStateException");
            assert_eq!(message, "lock not held");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_non_retryable_fails_once_with_connection_lost() {
    let member = MockMember::start().await;
    member.set_responder(|_| Reply::Close);
    let client = client_for(&member).await;
    let (k, v) = (key(b"k"), key(b"v"));

    let err = client
        .invoke_codec(&MapPutCodec {
            name: "m",
            key: &k,
            value: &v,
            thread_id: 1,
            ttl_millis: -1,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, HazelcastError::ConnectionLost(_)), "got {err}");
    assert_eq!(member.request_count(MAP_PUT), 1);
    assert_eq!(client.pending_invocations(), 0);
}

#[tokio::test]
async fn test_retryable_completes_after_reconnect() {
    let member = MockMember::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    member.set_responder(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Reply::Close
        } else {
            Reply::Respond(response::data(Some(&key(b"value"))))
        }
    });
    let client = client_for(&member).await;
    let k = key(b"k");

    let value = client
        .invoke_codec(&MapGetCodec {
            name: "m",
            key: &k,
            thread_id: 1,
        })
        .await
        .unwrap();

    assert_eq!(value, Some(key(b"value")));
    assert_eq!(member.request_count(MAP_GET), 2);
    assert!(member.accepted_connections() >= 2);
}

#[tokio::test]
async fn test_retryable_exhausts_retries() {
    let member = MockMember::start().await;
    member.set_responder(|_| Reply::Close);
    common::init_tracing();
    let config = config_for(&[member.address()])
        .retry(|r| {
            r.initial_backoff(Duration::from_millis(5))
                .max_backoff(Duration::from_millis(20))
                .max_retries(2)
        })
        .build()
        .unwrap();
    let client = HazelcastClient::new(config).await.unwrap();
    let k = key(b"k");

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client.invoke_codec(&MapGetCodec {
            name: "m",
            key: &k,
            thread_id: 1,
        }),
    )
    .await
    .expect("retry loop did not finish")
    .unwrap_err();

    assert!(
        matches!(err, HazelcastError::OperationTimeout { attempts: 3, .. }),
        "got {err}"
    );
    assert_eq!(member.request_count(MAP_GET), 3);
}

#[tokio::test]
async fn test_invocation_timeout() {
    let member = MockMember::start().await;
    member.set_responder(|_| Reply::Silent);
    common::init_tracing();
    let config = config_for(&[member.address()])
        .invocation_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let client = HazelcastClient::new(config).await.unwrap();

    let err = client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap_err();

    assert!(
        matches!(err, HazelcastError::OperationTimeout { attempts: 1, .. }),
        "got {err}"
    );
    assert_eq!(client.pending_invocations(), 0);
}

#[tokio::test]
async fn test_unknown_correlation_id_is_dropped() {
    let member = MockMember::start().await;
    member.set_responder(|request| {
        let mut stray = response::boolean(true);
        stray.set_correlation_id(987_654_321);
        let mut answer = response::void();
        answer.set_correlation_id(request.correlation_id());
        Reply::Raw(vec![stray, answer])
    });
    let client = client_for(&member).await;

    client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap();
    assert_eq!(client.pending_invocations(), 0);

    // The connection survives the stray frame.
    client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap();
    assert_eq!(member.accepted_connections(), 1);
}

#[tokio::test]
async fn test_cancelled_invoke_removes_pending_entry() {
    let member = MockMember::start().await;
    member.set_responder(|_| Reply::Silent);
    let client = client_for(&member).await;

    let task_client = client.clone();
    let handle = tokio::spawn(async move {
        task_client
            .invoke(LockForceUnlockCodec { name: "myLock" }.encode_request(), None)
            .await
    });

    member.wait_for_requests(LOCK_FORCE_UNLOCK, 1).await;
    assert_eq!(client.pending_invocations(), 1);

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert_eq!(client.pending_invocations(), 0);
}

#[tokio::test]
async fn test_routes_to_partition_owner() {
    let owner = MockMember::start().await;
    let entry = MockMember::start().await;
    owner.set_partition_owner(owner.address());
    entry.set_partition_owner(owner.address());
    let client = client_for(&entry).await;
    assert_eq!(client.connection_count(), 2);

    let k = key(b"routed");
    client
        .invoke_codec(&MapGetCodec {
            name: "m",
            key: &k,
            thread_id: 1,
        })
        .await
        .unwrap();

    assert_eq!(owner.request_count(MAP_GET), 1);
    assert_eq!(entry.request_count(MAP_GET), 0);
}

#[tokio::test]
async fn test_transaction_commit_reaches_creating_member() {
    let member = MockMember::start().await;
    member.set_responder(|request| match request.message_type() {
        TRANSACTION_CREATE => Reply::Respond(response::string("txn-1")),
        _ => Reply::Respond(response::void()),
    });
    let client = client_for(&member).await;

    let txn_id = client
        .invoke_codec(&TransactionCreateCodec {
            timeout_millis: 120_000,
            durability: 1,
            transaction_type: TransactionType::TwoPhase,
            thread_id: 1,
        })
        .await
        .unwrap();
    assert_eq!(txn_id, "txn-1");

    let commit = TransactionCommitCodec {
        txn_id: &txn_id,
        thread_id: 1,
    };
    let reply = client
        .invoke_on(member.address(), commit.encode_request())
        .await
        .unwrap();
    TransactionCommitCodec::decode_response(&reply).unwrap();

    let commits = member.requests_of(TRANSACTION_COMMIT);
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].reader().get_str().unwrap(), "txn-1");
    assert_eq!(client.pending_invocations(), 0);
}

#[tokio::test]
async fn test_calls_fail_after_shutdown() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;
    assert!(client.is_running());

    client.shutdown().await.unwrap();
    client.shutdown().await.unwrap();
    assert!(!client.is_running());
    assert_eq!(client.connection_count(), 0);

    let err = client
        .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
        .await
        .unwrap_err();
    assert!(matches!(err, HazelcastError::Connection(_)));
}

#[tokio::test]
async fn test_pending_invocations_fail_on_shutdown() {
    let member = MockMember::start().await;
    member.set_responder(|_| Reply::Silent);
    let client = client_for(&member).await;

    let task_client = client.clone();
    let handle = tokio::spawn(async move {
        task_client
            .invoke_codec(&LockForceUnlockCodec { name: "myLock" })
            .await
    });
    member.wait_for_requests(LOCK_FORCE_UNLOCK, 1).await;

    client.shutdown().await.unwrap();
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, HazelcastError::ConnectionLost(_)), "got {err}");
}
