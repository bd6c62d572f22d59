//! Random-access reader over one portable body.

use std::sync::Arc;

use super::{ClassDefinition, ClassKey, FieldType, PortableReader, SchemaRegistry};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_input::char_from_unit;
use crate::serialization::{DataInput, ObjectDataInput};

const OFFSET_SIZE: usize = 4;

/// Reads fields of a portable body by name.
///
/// Every read goes through the offset table, so the cost of a read does not
/// depend on how many other fields the body holds or in which order they
/// were written.
pub struct DefaultPortableReader<'a> {
    registry: &'a SchemaRegistry,
    definition: Arc<ClassDefinition>,
    body: &'a [u8],
}

impl std::fmt::Debug for DefaultPortableReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPortableReader")
            .field("key", &self.definition.key())
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl<'a> DefaultPortableReader<'a> {
    /// Creates a reader over `body`, checking its field table against the
    /// definition.
    pub fn new(
        registry: &'a SchemaRegistry,
        definition: Arc<ClassDefinition>,
        body: &'a [u8],
    ) -> Result<Self> {
        let mut input = ObjectDataInput::new(body);
        let count = input.read_array_len()?.unwrap_or(0);
        if count != definition.field_count() {
            return Err(HazelcastError::Serialization(format!(
                "{} declares {} fields, body holds {}",
                definition.key(),
                definition.field_count(),
                count
            )));
        }
        if input.remaining() < count * OFFSET_SIZE {
            return Err(HazelcastError::Serialization(format!(
                "offset table of {} truncated",
                definition.key()
            )));
        }
        Ok(Self {
            registry,
            definition,
            body,
        })
    }

    /// Returns the definition this reader follows.
    pub fn class_definition(&self) -> &Arc<ClassDefinition> {
        &self.definition
    }

    /// Positions an input just past the tag of field `name`.
    fn seek(&self, name: &str, field_type: FieldType) -> Result<ObjectDataInput<'a>> {
        let field = self
            .definition
            .field(name)
            .ok_or_else(|| HazelcastError::UnknownField {
                key: self.definition.key(),
                field: name.to_string(),
            })?;
        if field.field_type() != field_type {
            return Err(HazelcastError::TypeMismatch {
                field: name.to_string(),
                expected: field.field_type().to_string(),
                actual: field_type.to_string(),
            });
        }

        let mut input = ObjectDataInput::new(self.body);
        input.set_position(OFFSET_SIZE + field.index() * OFFSET_SIZE)?;
        let offset = input.read_int()?;
        let offset = usize::try_from(offset).map_err(|_| {
            HazelcastError::Serialization(format!("negative offset {} for '{}'", offset, name))
        })?;
        input.set_position(offset)?;

        let tag = input.read_byte()? as u8;
        if tag != field_type.id() {
            return Err(HazelcastError::TypeMismatch {
                field: name.to_string(),
                expected: field_type.to_string(),
                actual: FieldType::from_id(tag)
                    .map_or_else(|_| format!("tag {}", tag), |t| t.to_string()),
            });
        }
        Ok(input)
    }

    fn read_array<T>(
        &self,
        name: &str,
        field_type: FieldType,
        mut read: impl FnMut(&mut ObjectDataInput<'a>) -> Result<T>,
    ) -> Result<Option<Vec<T>>> {
        let mut input = self.seek(name, field_type)?;
        let Some(len) = input.read_array_len()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(len.min(input.remaining()));
        for _ in 0..len {
            values.push(read(&mut input)?);
        }
        Ok(Some(values))
    }

    /// Checks a nested class key against the field's declared class.
    fn nested_key(&self, name: &str, input: &mut ObjectDataInput<'a>) -> Result<ClassKey> {
        let key = ClassKey::new(input.read_int()?, input.read_int()?, input.read_int()?);
        let declared = self.definition.field(name).and_then(|f| f.nested_key());
        match declared {
            Some(d) if d.factory_id == key.factory_id && d.class_id == key.class_id => Ok(key),
            _ => Err(HazelcastError::TypeMismatch {
                field: name.to_string(),
                expected: declared.map_or_else(|| "portable".to_string(), |k| k.to_string()),
                actual: key.to_string(),
            }),
        }
    }

    /// Builds a reader over the `[bodyLen][body]` at the input position.
    fn nested_reader(
        &self,
        input: &mut ObjectDataInput<'a>,
        key: ClassKey,
    ) -> Result<DefaultPortableReader<'a>> {
        let definition = self
            .registry
            .get(key)
            .ok_or_else(|| HazelcastError::SchemaUnavailable {
                key,
                reason: "nested definition not resolved".to_string(),
            })?;
        let len = input.read_array_len()?.unwrap_or(0);
        let body = input.read_slice(len)?;
        DefaultPortableReader::new(self.registry, definition, body)
    }
}

impl PortableReader for DefaultPortableReader<'_> {
    fn factory_id(&self) -> i32 {
        self.definition.factory_id()
    }

    fn class_id(&self) -> i32 {
        self.definition.class_id()
    }

    fn version(&self) -> i32 {
        self.definition.version()
    }

    fn has_field(&self, name: &str) -> bool {
        self.definition.has_field(name)
    }

    fn field_type(&self, name: &str) -> Option<FieldType> {
        self.definition.field(name).map(|f| f.field_type())
    }

    fn read_byte(&mut self, name: &str) -> Result<i8> {
        self.seek(name, FieldType::Byte)?.read_byte()
    }

    fn read_bool(&mut self, name: &str) -> Result<bool> {
        self.seek(name, FieldType::Bool)?.read_bool()
    }

    fn read_char(&mut self, name: &str) -> Result<char> {
        char_from_unit(self.seek(name, FieldType::Char)?.read_char()?)
    }

    fn read_short(&mut self, name: &str) -> Result<i16> {
        self.seek(name, FieldType::Short)?.read_short()
    }

    fn read_int(&mut self, name: &str) -> Result<i32> {
        self.seek(name, FieldType::Int)?.read_int()
    }

    fn read_long(&mut self, name: &str) -> Result<i64> {
        self.seek(name, FieldType::Long)?.read_long()
    }

    fn read_float(&mut self, name: &str) -> Result<f32> {
        self.seek(name, FieldType::Float)?.read_float()
    }

    fn read_double(&mut self, name: &str) -> Result<f64> {
        self.seek(name, FieldType::Double)?.read_double()
    }

    fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        self.seek(name, FieldType::Utf8)?.read_nullable_string()
    }

    fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<i8>>> {
        self.read_array(name, FieldType::ByteArray, |i| i.read_byte())
    }

    fn read_bool_array(&mut self, name: &str) -> Result<Option<Vec<bool>>> {
        self.read_array(name, FieldType::BoolArray, |i| i.read_bool())
    }

    fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<char>>> {
        self.read_array(name, FieldType::CharArray, |i| char_from_unit(i.read_char()?))
    }

    fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>> {
        self.read_array(name, FieldType::ShortArray, |i| i.read_short())
    }

    fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>> {
        self.read_array(name, FieldType::IntArray, |i| i.read_int())
    }

    fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>> {
        self.read_array(name, FieldType::LongArray, |i| i.read_long())
    }

    fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>> {
        self.read_array(name, FieldType::FloatArray, |i| i.read_float())
    }

    fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>> {
        self.read_array(name, FieldType::DoubleArray, |i| i.read_double())
    }

    fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<String>>> {
        self.read_array(name, FieldType::Utf8Array, |i| i.read_string())
    }

    fn read_portable_with(
        &mut self,
        name: &str,
        read: &mut dyn FnMut(&mut dyn PortableReader) -> Result<()>,
    ) -> Result<bool> {
        let mut input = self.seek(name, FieldType::Portable)?;
        if input.read_bool()? {
            return Ok(false);
        }
        let key = self.nested_key(name, &mut input)?;
        let mut nested = self.nested_reader(&mut input, key)?;
        read(&mut nested)?;
        Ok(true)
    }

    fn read_portable_array_with(
        &mut self,
        name: &str,
        read: &mut dyn FnMut(&mut dyn PortableReader) -> Result<()>,
    ) -> Result<Option<usize>> {
        let mut input = self.seek(name, FieldType::PortableArray)?;
        let Some(len) = input.read_array_len()? else {
            return Ok(None);
        };
        let key = self.nested_key(name, &mut input)?;
        for _ in 0..len {
            let mut nested = self.nested_reader(&mut input, key)?;
            read(&mut nested)?;
        }
        Ok(Some(len))
    }
}
