//! Member connections: framing, authentication, reader tasks and heartbeats.

#[allow(clippy::module_inception)]
mod connection;
mod pool;

pub use connection::{Connection, ConnectionId, HEARTBEAT_CORRELATION_ID};
pub use pool::{ConnectionEvent, ConnectionPool, InboundHandler};
