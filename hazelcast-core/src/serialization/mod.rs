//! Serialization framework for Hazelcast's binary format.
//!
//! Values travel as [`Data`]: a partition hash, a type id and a big-endian
//! payload. Builtin types use fixed serializers, identified types go through
//! registered factories and [`Portable`] types through the schema-driven
//! portable format.

mod data;
mod data_input;
mod data_output;
mod identified;
pub mod portable;
mod service;
mod traits;

pub use data::*;
pub use data_input::{DataInput, ObjectDataInput};
pub use data_output::{DataOutput, ObjectDataOutput};
pub use identified::{
    read_identified_into, write_identified, DataSerializableFactory, FactoryRegistry,
    IdentifiedDataSerializable, IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
};
pub use portable::{
    ClassDefinition, ClassDefinitionBuilder, ClassDefinitionSource, ClassKey,
    DefaultPortableReader, DefaultPortableWriter, FieldDefinition, FieldType, Portable,
    PortableReader, PortableSerializer, PortableWriter, SchemaRegistry, PORTABLE_TYPE_ID,
};
pub use service::{FromData, SerializationService, ToData};
pub use traits::{Deserializable, Serializable};
