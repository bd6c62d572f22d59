//! Cluster topology as seen by the invocation layer.

mod partition_table;

use std::net::SocketAddr;

pub use partition_table::{Partition, PartitionTable};

/// Read-only source of partition ownership and member addresses.
///
/// The client ships [`PartitionTable`]; another membership source can be
/// plugged in by implementing this trait.
pub trait ClusterView: Send + Sync {
    /// Returns the address of the member owning `partition_id`.
    fn current_owner(&self, partition_id: i32) -> Option<SocketAddr>;

    /// Returns the addresses of known members.
    fn members(&self) -> Vec<SocketAddr>;

    /// Returns the number of partitions, or 0 while unknown.
    fn partition_count(&self) -> i32;
}
