//! Partition ownership table used for key-based routing.

use std::net::SocketAddr;

use hazelcast_core::protocol::codecs::client::PartitionOwnership;
use hazelcast_core::serialization::Data;
use hazelcast_core::{partition_id, HazelcastError, Result};
use parking_lot::RwLock;

use super::ClusterView;

/// Upper bound on partition ids accepted from any source.
pub const MAX_PARTITION_COUNT: i32 = 1 << 16;

/// A single partition and the member that owns it, if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    id: i32,
    owner: Option<SocketAddr>,
}

impl Partition {
    /// Creates a new partition with the given ID and optional owner.
    pub fn new(id: i32, owner: Option<SocketAddr>) -> Self {
        Self { id, owner }
    }

    /// Returns the partition ID.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns the address of the partition owner, if known.
    pub fn owner(&self) -> Option<SocketAddr> {
        self.owner
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.owner {
            Some(owner) => write!(f, "Partition[id={}, owner={}]", self.id, owner),
            None => write!(f, "Partition[id={}, owner=unknown]", self.id),
        }
    }
}

#[derive(Debug, Default)]
struct TableState {
    owners: Vec<Option<SocketAddr>>,
    members: Vec<SocketAddr>,
    version: u64,
}

impl TableState {
    fn rebuild_members(&mut self) {
        let mut members: Vec<SocketAddr> = Vec::new();
        for owner in self.owners.iter().flatten() {
            if !members.contains(owner) {
                members.push(*owner);
            }
        }
        self.members = members;
        self.version += 1;
    }
}

/// Read-mostly view of which member owns each partition.
///
/// Empty until the first refresh; while empty every lookup misses and
/// invocations go to any live connection.
#[derive(Debug, Default)]
pub struct PartitionTable {
    state: RwLock<TableState>,
}

impl PartitionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the table with the ownership reported by the cluster.
    ///
    /// The partition count becomes the highest partition id plus one.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if an owner address is not an IP literal, or a
    /// partition id is negative or not below the number of partitions
    /// reported. The table is left unchanged.
    pub fn update(&self, ownership: &[PartitionOwnership]) -> Result<()> {
        let reported: usize = ownership.iter().map(|entry| entry.partitions.len()).sum();
        let bound = i32::try_from(reported)
            .unwrap_or(i32::MAX)
            .min(MAX_PARTITION_COUNT);
        let mut resolved = Vec::with_capacity(reported.min(bound as usize));
        let mut count = 0i32;
        for entry in ownership {
            let address = entry.address.to_socket_addr()?;
            for &id in &entry.partitions {
                let next = id
                    .checked_add(1)
                    .filter(|next| id >= 0 && *next <= bound)
                    .ok_or_else(|| {
                        HazelcastError::Protocol(format!(
                            "partition id {} for {} outside 0..{}",
                            id, address, bound
                        ))
                    })?;
                count = count.max(next);
                resolved.push((id, address));
            }
        }

        let mut owners = vec![None; count as usize];
        for (id, address) in resolved {
            owners[id as usize] = Some(address);
        }

        let mut state = self.state.write();
        state.owners = owners;
        state.rebuild_members();
        tracing::debug!(
            partition_count = count,
            member_count = state.members.len(),
            version = state.version,
            "partition table updated"
        );
        Ok(())
    }

    /// Sets the owner of one partition, growing the table if needed.
    ///
    /// Ids outside `0..MAX_PARTITION_COUNT` are ignored.
    pub fn set_owner(&self, partition_id: i32, owner: SocketAddr) {
        if !(0..MAX_PARTITION_COUNT).contains(&partition_id) {
            tracing::warn!(partition_id, "ignoring out of range partition owner");
            return;
        }
        let index = partition_id as usize;
        let mut state = self.state.write();
        if state.owners.len() <= index {
            state.owners.resize(index + 1, None);
        }
        state.owners[index] = Some(owner);
        state.rebuild_members();
    }

    /// Forgets every owner.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.owners.clear();
        state.rebuild_members();
    }

    /// Returns the partition a key routes to, or `None` while the table is
    /// empty.
    pub fn partition_for(&self, key: &Data) -> Option<i32> {
        let count = self.partition_count();
        (count > 0).then(|| partition_id(key.partition_hash(), count))
    }

    /// Returns every partition with its owner.
    pub fn snapshot(&self) -> Vec<Partition> {
        self.state
            .read()
            .owners
            .iter()
            .enumerate()
            .map(|(id, owner)| Partition::new(id as i32, *owner))
            .collect()
    }

    /// Returns a counter bumped on every change.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }
}

impl ClusterView for PartitionTable {
    fn current_owner(&self, partition_id: i32) -> Option<SocketAddr> {
        if partition_id < 0 {
            return None;
        }
        self.state
            .read()
            .owners
            .get(partition_id as usize)
            .copied()
            .flatten()
    }

    fn members(&self) -> Vec<SocketAddr> {
        self.state.read().members.clone()
    }

    fn partition_count(&self) -> i32 {
        self.state.read().owners.len() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazelcast_core::protocol::codecs::client::Address;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn ownership(port: u16, partitions: Vec<i32>) -> PartitionOwnership {
        PartitionOwnership {
            address: Address::from(addr(port)),
            partitions,
        }
    }

    #[test]
    fn test_empty_table_routes_nowhere() {
        let table = PartitionTable::new();
        assert_eq!(table.partition_count(), 0);
        assert_eq!(table.current_owner(0), None);
        assert!(table.members().is_empty());
        assert_eq!(table.partition_for(&Data::new(-11, 0, b"key")), None);
    }

    #[test]
    fn test_update_replaces_ownership() {
        let table = PartitionTable::new();
        table
            .update(&[ownership(5701, vec![0, 2]), ownership(5702, vec![1, 3])])
            .unwrap();

        assert_eq!(table.partition_count(), 4);
        assert_eq!(table.current_owner(0), Some(addr(5701)));
        assert_eq!(table.current_owner(3), Some(addr(5702)));
        assert_eq!(table.current_owner(4), None);
        assert_eq!(table.current_owner(-1), None);
        assert_eq!(table.members(), vec![addr(5701), addr(5702)]);

        table.update(&[ownership(5703, vec![0, 1])]).unwrap();
        assert_eq!(table.partition_count(), 2);
        assert_eq!(table.members(), vec![addr(5703)]);
    }

    #[test]
    fn test_rejected_update_keeps_table() {
        let table = PartitionTable::new();
        table.update(&[ownership(5701, vec![0])]).unwrap();
        let version = table.version();

        let bad = PartitionOwnership {
            address: Address::new("member.local", 5701),
            partitions: vec![1],
        };
        assert!(table.update(&[bad]).is_err());
        assert!(table.update(&[ownership(5702, vec![-3])]).is_err());
        assert_eq!(table.version(), version);
        assert_eq!(table.current_owner(0), Some(addr(5701)));
    }

    #[test]
    fn test_update_rejects_out_of_range_partition_ids() {
        let table = PartitionTable::new();
        table.update(&[ownership(5701, vec![0, 1])]).unwrap();
        let version = table.version();

        for bad in [i32::MAX, -1, i32::MIN, 2] {
            let err = table
                .update(&[ownership(5701, vec![0]), ownership(5702, vec![bad])])
                .unwrap_err();
            assert!(matches!(err, HazelcastError::Protocol(_)), "id {bad}: {err}");
        }
        assert_eq!(table.version(), version);
        assert_eq!(table.partition_count(), 2);
        assert_eq!(table.current_owner(1), Some(addr(5701)));
    }

    #[test]
    fn test_set_owner_ignores_out_of_range_ids() {
        let table = PartitionTable::new();
        table.set_owner(i32::MAX, addr(5701));
        table.set_owner(MAX_PARTITION_COUNT, addr(5701));
        table.set_owner(-1, addr(5701));
        assert_eq!(table.partition_count(), 0);
        assert_eq!(table.version(), 0);
    }

    #[test]
    fn test_set_owner_grows_table() {
        let table = PartitionTable::new();
        table.set_owner(2, addr(5701));
        assert_eq!(table.partition_count(), 3);
        assert_eq!(table.current_owner(1), None);
        assert_eq!(table.current_owner(2), Some(addr(5701)));

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[2].to_string(), "Partition[id=2, owner=127.0.0.1:5701]");

        table.clear();
        assert_eq!(table.partition_count(), 0);
    }

    #[test]
    fn test_partition_for_is_stable() {
        let table = PartitionTable::new();
        table.update(&[ownership(5701, (0..271).collect())]).unwrap();
        let key = Data::new(-11, 0, b"order-17");
        let first = table.partition_for(&key).unwrap();
        assert!((0..271).contains(&first));
        assert_eq!(table.partition_for(&key), Some(first));
    }
}
