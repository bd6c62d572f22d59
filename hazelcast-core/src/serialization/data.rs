//! The serialized form of keys and values.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{HazelcastError, Result};
use crate::partition::compute_partition_hash;

/// Size of the `[partitionHash][typeId]` prefix.
pub const DATA_HEADER_SIZE: usize = 8;

const PARTITION_HASH_OFFSET: usize = 0;
const TYPE_ID_OFFSET: usize = 4;

/// Type id of a serialized null.
pub const NULL_TYPE_ID: i32 = 0;
/// Type id of `i8` values.
pub const BYTE_TYPE_ID: i32 = -3;
/// Type id of `bool` values.
pub const BOOLEAN_TYPE_ID: i32 = -4;
/// Type id of UTF-16 code units.
pub const CHAR_TYPE_ID: i32 = -5;
/// Type id of `i16` values.
pub const SHORT_TYPE_ID: i32 = -6;
/// Type id of `i32` values.
pub const INTEGER_TYPE_ID: i32 = -7;
/// Type id of `i64` values.
pub const LONG_TYPE_ID: i32 = -8;
/// Type id of `f32` values.
pub const FLOAT_TYPE_ID: i32 = -9;
/// Type id of `f64` values.
pub const DOUBLE_TYPE_ID: i32 = -10;
/// Type id of strings.
pub const STRING_TYPE_ID: i32 = -11;
/// Type id of byte arrays.
pub const BYTE_ARRAY_TYPE_ID: i32 = -12;

/// An immutable serialized object: `[partitionHash i32 BE][typeId i32 BE][payload]`.
///
/// Cloning is cheap; the bytes are reference counted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Data {
    bytes: Bytes,
}

impl Data {
    /// Wraps bytes that already carry the data header.
    ///
    /// # Errors
    ///
    /// Fails if fewer than [`DATA_HEADER_SIZE`] bytes are given.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < DATA_HEADER_SIZE {
            return Err(HazelcastError::Serialization(format!(
                "data must hold at least {} header bytes, got {}",
                DATA_HEADER_SIZE,
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Builds a `Data` from a type id and payload.
    ///
    /// A `partition_hash` of 0 means the hash is computed from the payload
    /// on demand.
    pub fn new(type_id: i32, partition_hash: i32, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(DATA_HEADER_SIZE + payload.len());
        buf.put_i32(partition_hash);
        buf.put_i32(type_id);
        buf.put_slice(payload);
        Self { bytes: buf.freeze() }
    }

    /// The serialized null value.
    pub fn null() -> Self {
        Self::new(NULL_TYPE_ID, 0, &[])
    }

    /// Returns the serializer type id.
    pub fn type_id(&self) -> i32 {
        (&self.bytes[TYPE_ID_OFFSET..DATA_HEADER_SIZE]).get_i32()
    }

    /// Returns true if this is the serialized null value.
    pub fn is_null(&self) -> bool {
        self.type_id() == NULL_TYPE_ID
    }

    /// Returns the hash used for partition routing.
    ///
    /// The stored hash is used when it is non-zero; otherwise the payload is
    /// hashed.
    pub fn partition_hash(&self) -> i32 {
        match (&self.bytes[PARTITION_HASH_OFFSET..TYPE_ID_OFFSET]).get_i32() {
            0 => compute_partition_hash(self.payload()),
            stored => stored,
        }
    }

    /// Returns the bytes after the header.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[DATA_HEADER_SIZE..]
    }

    /// Returns the full serialized form, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the total length, header included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if there is no payload after the header.
    pub fn is_empty(&self) -> bool {
        self.bytes.len() == DATA_HEADER_SIZE
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("type_id", &self.type_id())
            .field("len", &self.len())
            .finish()
    }
}
