//! Portable serialization: schema-driven, versioned objects with random
//! field access.
//!
//! Writing is two-pass. The first pass runs only for classes without a
//! stored definition and records the field list a [`Portable`] writes; the
//! second pass places each field block and records its offset in a table
//! indexed by the field's position in the definition. Readers use the same
//! table to jump straight to any field by name.

mod definition;
mod definition_writer;
mod reader;
mod registry;
mod serializer;
mod writer;

pub use definition::{
    ClassDefinition, ClassDefinitionBuilder, ClassKey, FieldDefinition, FieldType,
};
pub use definition_writer::ClassDefinitionWriter;
pub use reader::DefaultPortableReader;
pub use registry::{ClassDefinitionSource, SchemaRegistry, DEFAULT_SCHEMA_FETCH_TIMEOUT};
pub use serializer::{PortableSerializer, PORTABLE_TYPE_ID};
pub use writer::DefaultPortableWriter;

use crate::error::{HazelcastError, Result};

/// Types that serialize through the portable format.
///
/// The trait is object-safe; the generic conveniences for nested portables
/// live on `dyn PortableWriter` and `dyn PortableReader`.
pub trait Portable: Send + Sync {
    /// Returns the factory id of this class.
    fn factory_id(&self) -> i32;

    /// Returns the class id within the factory.
    fn class_id(&self) -> i32;

    /// Returns the schema version, or `None` for the configured default.
    fn class_version(&self) -> Option<i32> {
        None
    }

    /// Writes this object's fields.
    fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()>;

    /// Reads this object's fields.
    fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()>;
}

/// Field-by-name writer handed to [`Portable::write_portable`].
pub trait PortableWriter {
    /// Writes a byte field.
    fn write_byte(&mut self, name: &str, value: i8) -> Result<()>;

    /// Writes a boolean field.
    fn write_bool(&mut self, name: &str, value: bool) -> Result<()>;

    /// Writes a char field. Only characters of the basic multilingual plane
    /// are representable.
    fn write_char(&mut self, name: &str, value: char) -> Result<()>;

    /// Writes a short field.
    fn write_short(&mut self, name: &str, value: i16) -> Result<()>;

    /// Writes an int field.
    fn write_int(&mut self, name: &str, value: i32) -> Result<()>;

    /// Writes a long field.
    fn write_long(&mut self, name: &str, value: i64) -> Result<()>;

    /// Writes a float field.
    fn write_float(&mut self, name: &str, value: f32) -> Result<()>;

    /// Writes a double field.
    fn write_double(&mut self, name: &str, value: f64) -> Result<()>;

    /// Writes a nullable string field.
    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()>;

    /// Writes a byte array field.
    fn write_byte_array(&mut self, name: &str, value: Option<&[i8]>) -> Result<()>;

    /// Writes a boolean array field.
    fn write_bool_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()>;

    /// Writes a char array field.
    fn write_char_array(&mut self, name: &str, value: Option<&[char]>) -> Result<()>;

    /// Writes a short array field.
    fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()>;

    /// Writes an int array field.
    fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()>;

    /// Writes a long array field.
    fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()>;

    /// Writes a float array field.
    fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()>;

    /// Writes a double array field.
    fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()>;

    /// Writes a string array field.
    fn write_string_array(&mut self, name: &str, value: Option<&[String]>) -> Result<()>;

    /// Writes a non-null nested portable.
    fn write_portable_ref(&mut self, name: &str, value: &dyn Portable) -> Result<()>;

    /// Writes a null nested portable of the given class.
    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()>;

    /// Writes a portable array whose elements all belong to one class.
    fn write_portable_refs(
        &mut self,
        name: &str,
        factory_id: i32,
        class_id: i32,
        values: Option<&[&dyn Portable]>,
    ) -> Result<()>;
}

impl dyn PortableWriter + '_ {
    /// Writes a nullable nested portable.
    pub fn write_portable<P: Portable + Default>(
        &mut self,
        name: &str,
        value: Option<&P>,
    ) -> Result<()> {
        match value {
            Some(value) => self.write_portable_ref(name, value),
            None => {
                let prototype = P::default();
                self.write_null_portable(name, prototype.factory_id(), prototype.class_id())
            }
        }
    }

    /// Writes a nullable array of portables of one class.
    pub fn write_portable_array<P: Portable + Default>(
        &mut self,
        name: &str,
        values: Option<&[P]>,
    ) -> Result<()> {
        let prototype = P::default();
        let refs: Option<Vec<&dyn Portable>> =
            values.map(|values| values.iter().map(|v| v as &dyn Portable).collect());
        self.write_portable_refs(
            name,
            prototype.factory_id(),
            prototype.class_id(),
            refs.as_deref(),
        )
    }
}

/// Field-by-name reader handed to [`Portable::read_portable`].
///
/// Reads are random access: fields may be read in any order, any number of
/// times, and unread fields cost nothing.
pub trait PortableReader {
    /// Returns the factory id of the class being read.
    fn factory_id(&self) -> i32;

    /// Returns the class id of the class being read.
    fn class_id(&self) -> i32;

    /// Returns the schema version being read.
    fn version(&self) -> i32;

    /// Returns true if the definition has a field with this name.
    fn has_field(&self, name: &str) -> bool;

    /// Returns the declared type of a field.
    fn field_type(&self, name: &str) -> Option<FieldType>;

    /// Reads a byte field.
    fn read_byte(&mut self, name: &str) -> Result<i8>;

    /// Reads a boolean field.
    fn read_bool(&mut self, name: &str) -> Result<bool>;

    /// Reads a char field.
    fn read_char(&mut self, name: &str) -> Result<char>;

    /// Reads a short field.
    fn read_short(&mut self, name: &str) -> Result<i16>;

    /// Reads an int field.
    fn read_int(&mut self, name: &str) -> Result<i32>;

    /// Reads a long field.
    fn read_long(&mut self, name: &str) -> Result<i64>;

    /// Reads a float field.
    fn read_float(&mut self, name: &str) -> Result<f32>;

    /// Reads a double field.
    fn read_double(&mut self, name: &str) -> Result<f64>;

    /// Reads a nullable string field.
    fn read_string(&mut self, name: &str) -> Result<Option<String>>;

    /// Reads a byte array field.
    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<i8>>>;

    /// Reads a boolean array field.
    fn read_bool_array(&mut self, name: &str) -> Result<Option<Vec<bool>>>;

    /// Reads a char array field.
    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<char>>>;

    /// Reads a short array field.
    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>>;

    /// Reads an int array field.
    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>>;

    /// Reads a long array field.
    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>>;

    /// Reads a float array field.
    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>>;

    /// Reads a double array field.
    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>>;

    /// Reads a string array field.
    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>>;

    /// Hands a reader over the nested portable to `read`. Returns false,
    /// without calling `read`, if the field is null.
    fn read_portable_with(
        &mut self,
        name: &str,
        read: &mut dyn FnMut(&mut dyn PortableReader) -> Result<()>,
    ) -> Result<bool>;

    /// Hands a reader over each array element to `read`, in order. Returns
    /// the element count, or `None` if the array is null.
    fn read_portable_array_with(
        &mut self,
        name: &str,
        read: &mut dyn FnMut(&mut dyn PortableReader) -> Result<()>,
    ) -> Result<Option<usize>>;
}

fn read_into<P: Portable + Default>(reader: &mut dyn PortableReader, field: &str) -> Result<P> {
    let mut value = P::default();
    if value.factory_id() != reader.factory_id() || value.class_id() != reader.class_id() {
        return Err(HazelcastError::TypeMismatch {
            field: field.to_string(),
            expected: format!(
                "portable(factory={}, class={})",
                reader.factory_id(),
                reader.class_id()
            ),
            actual: format!(
                "portable(factory={}, class={})",
                value.factory_id(),
                value.class_id()
            ),
        });
    }
    value.read_portable(reader)?;
    Ok(value)
}

impl dyn PortableReader + '_ {
    /// Reads a nullable nested portable.
    pub fn read_portable<P: Portable + Default>(&mut self, name: &str) -> Result<Option<P>> {
        let mut value = None;
        self.read_portable_with(name, &mut |reader: &mut dyn PortableReader| {
            value = Some(read_into::<P>(reader, name)?);
            Ok(())
        })?;
        Ok(value)
    }

    /// Reads a nullable array of portables.
    pub fn read_portable_array<P: Portable + Default>(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<P>>> {
        let mut values = Vec::new();
        let len = self.read_portable_array_with(name, &mut |reader: &mut dyn PortableReader| {
            values.push(read_into::<P>(reader, name)?);
            Ok(())
        })?;
        Ok(len.map(|_| values))
    }
}
