//! Async Rust client core for [Hazelcast](https://hazelcast.com/).
//!
//! The crate turns encoded request frames into responses: it keeps one
//! authenticated connection per member, multiplexes requests over them by
//! correlation id, routes key-scoped requests to the partition owner,
//! retries safe operations after a connection loss and dispatches pushed
//! events to listener registrations. Frames, codecs and serialization live
//! in [`hazelcast_core`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hazelcast_client::{ClientConfig, HazelcastClient};
//! use hazelcast_core::protocol::codecs::lock::LockForceUnlockCodec;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .cluster_name("dev")
//!         .add_address("127.0.0.1:5701".parse()?)
//!         .build()?;
//!     let client = HazelcastClient::new(config).await?;
//!
//!     client.invoke_codec(&LockForceUnlockCodec { name: "myLock" }).await?;
//!
//!     client.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Use [`ClientConfig::builder()`](ClientConfig::builder) to construct a
//! config. Validation happens in `build()`:
//!
//! ```rust,no_run
//! use hazelcast_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .cluster_name("production")
//!     .add_address("10.0.0.1:5701".parse().unwrap())
//!     .connection_timeout(Duration::from_secs(10))
//!     .credentials("admin", "secret")
//!     .invocation_timeout(Duration::from_secs(30))
//!     .retry(|r| r
//!         .initial_backoff(Duration::from_millis(100))
//!         .max_backoff(Duration::from_secs(30))
//!         .multiplier(2.0)
//!         .max_retries(10))
//!     .build()
//!     .expect("invalid config");
//! ```
//!
//! # Listeners
//!
//! [`HazelcastClient::add_listener`] registers a handler locally, then sends
//! the add-listener request built from the new registration id. Events for
//! one registration are delivered in arrival order on their own task. When
//! the member a registration was added through goes away, the client adds
//! it again on another member.
//!
//! # Feature Flags
//!
//! | Flag | Purpose |
//! |------|---------|
//! | `derive` | `#[derive(HazelcastPortable)]` re-exported through `hazelcast-core` |

#![warn(missing_docs)]

mod client;
pub mod cluster;
pub mod config;
pub mod connection;
pub mod invocation;
pub mod listener;

pub use client::HazelcastClient;
pub use cluster::{ClusterView, Partition, PartitionTable};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, NetworkConfig, NetworkConfigBuilder,
    RetryConfig, RetryConfigBuilder, SecurityConfig, SecurityConfigBuilder, SerializationConfig,
    SerializationConfigBuilder,
};
pub use connection::{Connection, ConnectionEvent, ConnectionId, ConnectionPool, InboundHandler};
pub use hazelcast_core as protocol;
pub use hazelcast_core::{HazelcastError, Result};
pub use invocation::InvocationService;
pub use listener::{
    EntryListener, EntryListenerHandler, EventDispatcher, EventHandler, FnEntryListener,
    FnEntryListenerBuilder, LifecycleEvent, RegistrationId, ReregistrationNeeded,
};
