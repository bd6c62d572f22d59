//! Second writing pass: field blocks and the offset table.

use std::sync::Arc;

use super::{ClassDefinition, ClassKey, FieldType, Portable, PortableSerializer, PortableWriter};
use crate::error::{HazelcastError, Result};
use crate::serialization::data_output::utf16_unit;
use crate::serialization::{DataOutput, ObjectDataOutput};

const OFFSET_SIZE: usize = 4;

/// Writes one portable body against a known [`ClassDefinition`].
///
/// The body starts with the field count and an offset table with one slot
/// per field, in definition order. Each `write_*` call appends a tagged field
/// block wherever the output currently is and stores its offset in the
/// field's slot, so fields may be written in any order. Fields never written
/// get their default value in [`finish`](Self::finish).
pub struct DefaultPortableWriter<'a> {
    serializer: &'a PortableSerializer,
    definition: Arc<ClassDefinition>,
    output: &'a mut ObjectDataOutput,
    begin: usize,
    offsets: usize,
    written: Vec<bool>,
}

impl<'a> DefaultPortableWriter<'a> {
    /// Starts a body at the current output position.
    pub fn new(
        serializer: &'a PortableSerializer,
        definition: Arc<ClassDefinition>,
        output: &'a mut ObjectDataOutput,
    ) -> Result<Self> {
        let count = definition.field_count();
        let begin = output.position();
        output.write_array_len(Some(count))?;
        let offsets = output.reserve_zeroed(count * OFFSET_SIZE);
        Ok(Self {
            serializer,
            definition,
            output,
            begin,
            offsets,
            written: vec![false; count],
        })
    }

    /// Returns the definition this body follows.
    pub fn class_definition(&self) -> &Arc<ClassDefinition> {
        &self.definition
    }

    /// Fills in every field that was not written.
    pub fn finish(mut self) -> Result<()> {
        let definition = Arc::clone(&self.definition);
        for field in definition.fields() {
            if !self.written[field.index()] {
                self.mark(field.index(), field.field_type())?;
                self.write_default(field.field_type())?;
            }
        }
        Ok(())
    }

    fn write_default(&mut self, field_type: FieldType) -> Result<()> {
        match field_type {
            FieldType::Byte => self.output.write_byte(0),
            FieldType::Bool => self.output.write_bool(false),
            FieldType::Char => self.output.write_char(0),
            FieldType::Short => self.output.write_short(0),
            FieldType::Int => self.output.write_int(0),
            FieldType::Long => self.output.write_long(0),
            FieldType::Float => self.output.write_float(0.0),
            FieldType::Double => self.output.write_double(0.0),
            FieldType::Portable => self.output.write_bool(true),
            _ => self.output.write_array_len(None),
        }
    }

    /// Validates a write and returns the field index and nested class.
    fn field(&self, name: &str, field_type: FieldType) -> Result<(usize, Option<ClassKey>)> {
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
        if self.written[field.index()] {
            return Err(HazelcastError::Serialization(format!(
                "field '{}' of {} written twice",
                name,
                self.definition.key()
            )));
        }
        Ok((field.index(), field.nested_key()))
    }

    fn mark(&mut self, index: usize, field_type: FieldType) -> Result<()> {
        let offset = self.output.position() - self.begin;
        self.output
            .write_int_at(self.offsets + index * OFFSET_SIZE, offset as i32)?;
        self.written[index] = true;
        self.output.write_byte(field_type.id() as i8)
    }

    fn put<F>(&mut self, name: &str, field_type: FieldType, write: F) -> Result<()>
    where
        F: FnOnce(&mut ObjectDataOutput) -> Result<()>,
    {
        let (index, _) = self.field(name, field_type)?;
        self.mark(index, field_type)?;
        write(&mut *self.output)
    }

    fn put_array<T: Copy>(
        &mut self,
        name: &str,
        field_type: FieldType,
        values: Option<&[T]>,
        mut write: impl FnMut(&mut ObjectDataOutput, T) -> Result<()>,
    ) -> Result<()> {
        self.put(name, field_type, |output| {
            output.write_array_len(values.map(<[T]>::len))?;
            for &value in values.unwrap_or_default() {
                write(output, value)?;
            }
            Ok(())
        })
    }

    /// Writes `[bodyLen][body]` for one nested object.
    fn write_nested_body(
        &mut self,
        value: &dyn Portable,
        definition: &Arc<ClassDefinition>,
    ) -> Result<()> {
        let length_slot = self.output.reserve_zeroed(OFFSET_SIZE);
        self.serializer
            .write_body(value, definition, &mut *self.output)?;
        let body_len = self.output.position() - length_slot - OFFSET_SIZE;
        self.output.write_int_at(length_slot, body_len as i32)
    }

    fn write_key(&mut self, key: ClassKey) -> Result<()> {
        self.output.write_int(key.factory_id)?;
        self.output.write_int(key.class_id)?;
        self.output.write_int(key.version)
    }
}

fn nested_mismatch(name: &str, declared: Option<ClassKey>, actual: ClassKey) -> HazelcastError {
    HazelcastError::TypeMismatch {
        field: name.to_string(),
        expected: declared.map_or_else(|| "portable".to_string(), |k| k.to_string()),
        actual: actual.to_string(),
    }
}

impl PortableWriter for DefaultPortableWriter<'_> {
    fn write_byte(&mut self, name: &str, value: i8) -> Result<()> {
        self.put(name, FieldType::Byte, |o| o.write_byte(value))
    }

    fn write_bool(&mut self, name: &str, value: bool) -> Result<()> {
        self.put(name, FieldType::Bool, |o| o.write_bool(value))
    }

    fn write_char(&mut self, name: &str, value: char) -> Result<()> {
        let unit = utf16_unit(value)?;
        self.put(name, FieldType::Char, |o| o.write_char(unit))
    }

    fn write_short(&mut self, name: &str, value: i16) -> Result<()> {
        self.put(name, FieldType::Short, |o| o.write_short(value))
    }

    fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.put(name, FieldType::Int, |o| o.write_int(value))
    }

    fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.put(name, FieldType::Long, |o| o.write_long(value))
    }

    fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.put(name, FieldType::Float, |o| o.write_float(value))
    }

    fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.put(name, FieldType::Double, |o| o.write_double(value))
    }

    fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.put(name, FieldType::Utf8, |o| o.write_nullable_string(value))
    }

    fn write_byte_array(&mut self, name: &str, value: Option<&[i8]>) -> Result<()> {
        self.put_array(name, FieldType::ByteArray, value, |o, v| o.write_byte(v))
    }

    fn write_bool_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()> {
        self.put_array(name, FieldType::BoolArray, value, |o, v| o.write_bool(v))
    }

    fn write_char_array(&mut self, name: &str, value: Option<&[char]>) -> Result<()> {
        let units = value
            .map(|chars| chars.iter().map(|&c| utf16_unit(c)).collect::<Result<Vec<_>>>())
            .transpose()?;
        self.put_array(name, FieldType::CharArray, units.as_deref(), |o, v| {
            o.write_char(v)
        })
    }

    fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()> {
        self.put_array(name, FieldType::ShortArray, value, |o, v| o.write_short(v))
    }

    fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()> {
        self.put_array(name, FieldType::IntArray, value, |o, v| o.write_int(v))
    }

    fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()> {
        self.put_array(name, FieldType::LongArray, value, |o, v| o.write_long(v))
    }

    fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()> {
        self.put_array(name, FieldType::FloatArray, value, |o, v| o.write_float(v))
    }

    fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()> {
        self.put_array(name, FieldType::DoubleArray, value, |o, v| o.write_double(v))
    }

    fn write_string_array(&mut self, name: &str, value: Option<&[String]>) -> Result<()> {
        self.put(name, FieldType::Utf8Array, |o| {
            o.write_array_len(value.map(<[String]>::len))?;
            for s in value.unwrap_or_default() {
                o.write_string(s)?;
            }
            Ok(())
        })
    }

    fn write_portable_ref(&mut self, name: &str, value: &dyn Portable) -> Result<()> {
        let (index, declared) = self.field(name, FieldType::Portable)?;
        let definition = self.serializer.class_definition(value)?;
        if declared != Some(definition.key()) {
            return Err(nested_mismatch(name, declared, definition.key()));
        }
        self.mark(index, FieldType::Portable)?;
        self.output.write_bool(false)?;
        self.write_key(definition.key())?;
        self.write_nested_body(value, &definition)
    }

    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()> {
        let (index, declared) = self.field(name, FieldType::Portable)?;
        if !declared.is_some_and(|k| k.factory_id == factory_id && k.class_id == class_id) {
            return Err(nested_mismatch(
                name,
                declared,
                ClassKey::new(factory_id, class_id, self.serializer.portable_version()),
            ));
        }
        self.mark(index, FieldType::Portable)?;
        self.output.write_bool(true)
    }

    fn write_portable_refs(
        &mut self,
        name: &str,
        factory_id: i32,
        class_id: i32,
        values: Option<&[&dyn Portable]>,
    ) -> Result<()> {
        let (index, declared) = self.field(name, FieldType::PortableArray)?;
        let nested = declared
            .filter(|k| k.factory_id == factory_id && k.class_id == class_id)
            .ok_or_else(|| {
                nested_mismatch(
                    name,
                    declared,
                    ClassKey::new(factory_id, class_id, self.serializer.portable_version()),
                )
            })?;

        let Some(values) = values else {
            self.mark(index, FieldType::PortableArray)?;
            return self.output.write_array_len(None);
        };

        let mut definitions = Vec::with_capacity(values.len());
        for value in values {
            let definition = self.serializer.class_definition(*value)?;
            if definition.key() != nested {
                return Err(nested_mismatch(name, declared, definition.key()));
            }
            definitions.push(definition);
        }

        self.mark(index, FieldType::PortableArray)?;
        self.output.write_array_len(Some(values.len()))?;
        self.write_key(nested)?;
        for (value, definition) in values.iter().zip(&definitions) {
            self.write_nested_body(*value, definition)?;
        }
        Ok(())
    }
}
