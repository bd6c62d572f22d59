//! Builtin serializers for primitive types.
//!
//! Each builtin type carries the type id written into its `Data` header, so
//! the service can reject a payload of the wrong kind before decoding it.

use super::data::*;
use super::data_input::char_from_unit;
use super::data_output::utf16_unit;
use super::{DataInput, DataOutput};
use crate::error::Result;

/// A type with a fixed builtin serializer.
pub trait Serializable {
    /// Type id written into the `Data` header.
    const TYPE_ID: i32;

    /// Serializes this value to the given output.
    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()>;
}

/// A type that can be read back by its builtin serializer.
pub trait Deserializable: Sized {
    /// Type id expected in the `Data` header.
    const TYPE_ID: i32;

    /// Deserializes a value from the given input.
    fn deserialize<R: DataInput>(input: &mut R) -> Result<Self>;
}

macro_rules! builtin {
    ($ty:ty, $type_id:expr, $write:ident, $read:ident) => {
        impl Serializable for $ty {
            const TYPE_ID: i32 = $type_id;

            fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
                output.$write(*self)
            }
        }

        impl Deserializable for $ty {
            const TYPE_ID: i32 = $type_id;

            fn deserialize<R: DataInput>(input: &mut R) -> Result<Self> {
                input.$read()
            }
        }
    };
}

builtin!(i8, BYTE_TYPE_ID, write_byte, read_byte);
builtin!(bool, BOOLEAN_TYPE_ID, write_bool, read_bool);
builtin!(i16, SHORT_TYPE_ID, write_short, read_short);
builtin!(i32, INTEGER_TYPE_ID, write_int, read_int);
builtin!(i64, LONG_TYPE_ID, write_long, read_long);
builtin!(f32, FLOAT_TYPE_ID, write_float, read_float);
builtin!(f64, DOUBLE_TYPE_ID, write_double, read_double);

/// Characters travel as a single UTF-16 code unit.
impl Serializable for char {
    const TYPE_ID: i32 = CHAR_TYPE_ID;

    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
        output.write_char(utf16_unit(*self)?)
    }
}

impl Deserializable for char {
    const TYPE_ID: i32 = CHAR_TYPE_ID;

    fn deserialize<R: DataInput>(input: &mut R) -> Result<Self> {
        char_from_unit(input.read_char()?)
    }
}

impl Serializable for str {
    const TYPE_ID: i32 = STRING_TYPE_ID;

    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
        output.write_string(self)
    }
}

impl Serializable for String {
    const TYPE_ID: i32 = STRING_TYPE_ID;

    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
        output.write_string(self)
    }
}

impl Deserializable for String {
    const TYPE_ID: i32 = STRING_TYPE_ID;

    fn deserialize<R: DataInput>(input: &mut R) -> Result<Self> {
        input.read_string()
    }
}

impl Serializable for [u8] {
    const TYPE_ID: i32 = BYTE_ARRAY_TYPE_ID;

    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
        output.write_array_len(Some(self.len()))?;
        output.write_bytes(self)
    }
}

impl Serializable for Vec<u8> {
    const TYPE_ID: i32 = BYTE_ARRAY_TYPE_ID;

    fn serialize<W: DataOutput>(&self, output: &mut W) -> Result<()> {
        self.as_slice().serialize(output)
    }
}

impl Deserializable for Vec<u8> {
    const TYPE_ID: i32 = BYTE_ARRAY_TYPE_ID;

    fn deserialize<R: DataInput>(input: &mut R) -> Result<Self> {
        let len = input.read_array_len()?.unwrap_or(0);
        input.read_bytes(len)
    }
}
