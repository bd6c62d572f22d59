//! Wire protocol, operation codecs and Portable serialization for the
//! Hazelcast client.
//!
//! This crate has no networking of its own. It defines how bytes on a
//! member connection are sliced into frames, how each operation is encoded
//! and decoded, and how application objects become [`Data`] and back.

#![warn(missing_docs)]

pub mod error;
pub mod partition;
pub mod protocol;
pub mod serialization;

pub use error::{HazelcastError, Result};
pub use partition::{compute_partition_hash, name_partition_hash, partition_id, PartitionAware};
pub use protocol::{CodecRegistry, Frame, FrameCodec, OperationCodec};
pub use serialization::{
    ClassDefinition, ClassKey, Data, DataInput, DataOutput, Deserializable, FromData,
    ObjectDataInput, ObjectDataOutput, Portable, PortableReader, PortableWriter, SchemaRegistry,
    Serializable, SerializationService, ToData,
};

#[cfg(feature = "derive")]
pub use hazelcast_derive::HazelcastPortable;
