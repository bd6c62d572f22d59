//! Partition hashing and key routing.
//!
//! A key's partition is derived from the murmur3 hash stored in (or computed
//! from) its serialized [`Data`](crate::serialization::Data). Keys can opt
//! into co-location by implementing [`PartitionAware`].

/// Seed used for every partition hash.
pub const PARTITION_HASH_SEED: u32 = 0x0100_0193;

/// Computes the partition hash of serialized key bytes.
pub fn compute_partition_hash(key: &[u8]) -> i32 {
    murmur_hash3_x86_32(key, PARTITION_HASH_SEED)
}

/// Computes the partition hash of a distributed object name.
///
/// Equals the hash of the name serialized as a string `Data`, so
/// operations scoped to a name run on the partition that owns it.
pub fn name_partition_hash(name: &str) -> i32 {
    let mut payload = Vec::with_capacity(4 + name.len());
    payload.extend_from_slice(&(name.len() as i32).to_be_bytes());
    payload.extend_from_slice(name.as_bytes());
    compute_partition_hash(&payload)
}

/// Maps a partition hash to a partition id in `0..partition_count`.
///
/// Returns 0 when `partition_count` is not positive.
pub fn partition_id(hash: i32, partition_count: i32) -> i32 {
    if partition_count <= 0 || hash == i32::MIN {
        return 0;
    }
    hash.abs() % partition_count
}

fn mix_k1(k1: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// MurmurHash3 x86 32-bit.
fn murmur_hash3_x86_32(data: &[u8], seed: u32) -> i32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc ^ (u32::from(b) << (8 * i)));
        h1 ^= mix_k1(k1);
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;

    h1 as i32
}

/// Keys that route by something other than their own serialized form.
///
/// When a key implements this trait, the partition hash stored in its
/// `Data` is computed from [`partition_key_bytes`](Self::partition_key_bytes)
/// so that all keys returning the same bytes land on one partition.
pub trait PartitionAware: Send + Sync {
    /// Returns the bytes the partition hash is computed from.
    fn partition_key_bytes(&self) -> Vec<u8>;
}
