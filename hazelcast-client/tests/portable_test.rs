//! Portable values through the cluster, with class definitions fetched
//! on demand.

mod common;

use std::time::Duration;

use common::{client_for, MockMember};
use hazelcast_client::{HazelcastClient, HazelcastError};
use hazelcast_core::protocol::codecs::map::{MapGetCodec, MapPutCodec};
use hazelcast_core::protocol::CLIENT_FETCH_CLASS_DEFINITION;
use hazelcast_core::serialization::Data;
use hazelcast_core::HazelcastPortable;

#[derive(Debug, Default, PartialEq, HazelcastPortable)]
#[hazelcast(factory_id = 1, class_id = 1)]
struct Person {
    age: i32,
    name: String,
}

#[derive(Debug, Default, PartialEq, HazelcastPortable)]
#[hazelcast(factory_id = 1, class_id = 99)]
struct Secret {
    code: i64,
}

fn alice() -> Person {
    Person {
        age: 30,
        name: "Alice".to_string(),
    }
}

/// Serializes `value` on `client` and teaches `member` its definition.
fn publish(client: &HazelcastClient, member: &MockMember, person: &Person) -> Data {
    let data = client.to_data(person).unwrap();
    let key = client.serialization().portable().class_key(person);
    let definition = client
        .serialization()
        .schema_registry()
        .get(key)
        .expect("definition registered on write");
    member.define_class((*definition).clone());
    data
}

#[tokio::test]
async fn test_put_get_round_trip_fetches_definition() {
    let member = MockMember::start().await;
    let writer = client_for(&member).await;
    let reader = client_for(&member).await;

    let key = writer.to_data("person-1").unwrap();
    let value = publish(&writer, &member, &alice());
    writer
        .invoke_codec(&MapPutCodec {
            name: "people",
            key: &key,
            value: &value,
            thread_id: 1,
            ttl_millis: -1,
        })
        .await
        .unwrap();

    let stored = reader
        .invoke_codec(&MapGetCodec {
            name: "people",
            key: &key,
            thread_id: 1,
        })
        .await
        .unwrap()
        .expect("entry missing");
    let person: Person = reader.to_object(&stored).await.unwrap();

    assert_eq!(person, alice());
    assert_eq!(member.request_count(CLIENT_FETCH_CLASS_DEFINITION), 1);

    // Known now, no second fetch.
    let again: Person = reader.to_object(&stored).await.unwrap();
    assert_eq!(again, alice());
    assert_eq!(member.request_count(CLIENT_FETCH_CLASS_DEFINITION), 1);
}

#[tokio::test]
async fn test_writer_needs_no_fetch() {
    let member = MockMember::start().await;
    let client = client_for(&member).await;

    let data = client.to_data(&alice()).unwrap();
    let person: Person = client.to_object(&data).await.unwrap();

    assert_eq!(person, alice());
    assert_eq!(member.request_count(CLIENT_FETCH_CLASS_DEFINITION), 0);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_fetch() {
    let member = MockMember::start().await;
    let writer = client_for(&member).await;
    let data = publish(&writer, &member, &alice());
    member.set_fetch_delay(Duration::from_millis(200));

    let reader = client_for(&member).await;
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let reader = reader.clone();
            let data = data.clone();
            tokio::spawn(async move { reader.to_object::<Person>(&data).await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), alice());
    }
    assert_eq!(member.request_count(CLIENT_FETCH_CLASS_DEFINITION), 1);
}

#[tokio::test]
async fn test_unknown_definition_is_unavailable() {
    let member = MockMember::start().await;
    let writer = client_for(&member).await;
    let reader = client_for(&member).await;

    let data = writer.to_data(&Secret { code: 42 }).unwrap();
    let err = reader.to_object::<Secret>(&data).await.unwrap_err();

    assert!(
        matches!(err, HazelcastError::SchemaUnavailable { .. }),
        "got {err}"
    );
    assert_eq!(member.request_count(CLIENT_FETCH_CLASS_DEFINITION), 1);
}
