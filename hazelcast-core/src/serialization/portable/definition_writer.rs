//! First writing pass: derives a class definition from `write_portable`.

use std::sync::Arc;

use super::{
    ClassDefinition, ClassKey, FieldDefinition, FieldType, Portable, PortableSerializer,
    PortableWriter,
};
use crate::error::{HazelcastError, Result};

/// A [`PortableWriter`] that records field names and types instead of
/// values. Field order in the resulting definition is the order of the
/// `write_*` calls.
pub struct ClassDefinitionWriter<'a> {
    serializer: &'a PortableSerializer,
    key: ClassKey,
    fields: Vec<FieldDefinition>,
}

impl<'a> ClassDefinitionWriter<'a> {
    /// Builds and registers the definition of `portable`, along with the
    /// definitions of every non-null nested portable it writes.
    pub fn register(
        serializer: &'a PortableSerializer,
        portable: &dyn Portable,
    ) -> Result<Arc<ClassDefinition>> {
        let mut writer = Self {
            serializer,
            key: serializer.class_key(portable),
            fields: Vec::new(),
        };
        portable.write_portable(&mut writer)?;
        writer.finish()
    }

    fn finish(self) -> Result<Arc<ClassDefinition>> {
        let definition = ClassDefinition::new(self.key, self.fields)?;
        self.serializer.registry().define(definition)
    }

    fn add(&mut self, name: &str, field_type: FieldType, nested: Option<ClassKey>) -> Result<()> {
        if self.fields.iter().any(|f| f.name() == name) {
            return Err(HazelcastError::Serialization(format!(
                "field '{}' of {} written twice",
                name, self.key
            )));
        }
        let index = self.fields.len();
        let field = match nested {
            Some(key) => FieldDefinition::new_nested(name, field_type, index, key),
            None => FieldDefinition::new(name, field_type, index),
        };
        self.fields.push(field);
        Ok(())
    }

    /// Looks up the definition for a nested class that has no instance to
    /// derive it from.
    fn registered(&self, factory_id: i32, class_id: i32) -> Result<ClassKey> {
        let key = ClassKey::new(factory_id, class_id, self.serializer.portable_version());
        self.serializer
            .registry()
            .get(key)
            .map(|definition| definition.key())
            .ok_or_else(|| HazelcastError::SchemaUnavailable {
                key,
                reason: "no instance to derive the nested definition from".to_string(),
            })
    }
}

impl PortableWriter for ClassDefinitionWriter<'_> {
    fn write_byte(&mut self, name: &str, _: i8) -> Result<()> {
        self.add(name, FieldType::Byte, None)
    }

    fn write_bool(&mut self, name: &str, _: bool) -> Result<()> {
        self.add(name, FieldType::Bool, None)
    }

    fn write_char(&mut self, name: &str, _: char) -> Result<()> {
        self.add(name, FieldType::Char, None)
    }

    fn write_short(&mut self, name: &str, _: i16) -> Result<()> {
        self.add(name, FieldType::Short, None)
    }

    fn write_int(&mut self, name: &str, _: i32) -> Result<()> {
        self.add(name, FieldType::Int, None)
    }

    fn write_long(&mut self, name: &str, _: i64) -> Result<()> {
        self.add(name, FieldType::Long, None)
    }

    fn write_float(&mut self, name: &str, _: f32) -> Result<()> {
        self.add(name, FieldType::Float, None)
    }

    fn write_double(&mut self, name: &str, _: f64) -> Result<()> {
        self.add(name, FieldType::Double, None)
    }

    fn write_string(&mut self, name: &str, _: Option<&str>) -> Result<()> {
        self.add(name, FieldType::Utf8, None)
    }

    fn write_byte_array(&mut self, name: &str, _: Option<&[i8]>) -> Result<()> {
        self.add(name, FieldType::ByteArray, None)
    }

    fn write_bool_array(&mut self, name: &str, _: Option<&[bool]>) -> Result<()> {
        self.add(name, FieldType::BoolArray, None)
    }

    fn write_char_array(&mut self, name: &str, _: Option<&[char]>) -> Result<()> {
        self.add(name, FieldType::CharArray, None)
    }

    fn write_short_array(&mut self, name: &str, _: Option<&[i16]>) -> Result<()> {
        self.add(name, FieldType::ShortArray, None)
    }

    fn write_int_array(&mut self, name: &str, _: Option<&[i32]>) -> Result<()> {
        self.add(name, FieldType::IntArray, None)
    }

    fn write_long_array(&mut self, name: &str, _: Option<&[i64]>) -> Result<()> {
        self.add(name, FieldType::LongArray, None)
    }

    fn write_float_array(&mut self, name: &str, _: Option<&[f32]>) -> Result<()> {
        self.add(name, FieldType::FloatArray, None)
    }

    fn write_double_array(&mut self, name: &str, _: Option<&[f64]>) -> Result<()> {
        self.add(name, FieldType::DoubleArray, None)
    }

    fn write_string_array(&mut self, name: &str, _: Option<&[String]>) -> Result<()> {
        self.add(name, FieldType::Utf8Array, None)
    }

    fn write_portable_ref(&mut self, name: &str, value: &dyn Portable) -> Result<()> {
        let nested = self.serializer.class_definition(value)?;
        self.add(name, FieldType::Portable, Some(nested.key()))
    }

    fn write_null_portable(&mut self, name: &str, factory_id: i32, class_id: i32) -> Result<()> {
        let nested = self.registered(factory_id, class_id)?;
        self.add(name, FieldType::Portable, Some(nested))
    }

    fn write_portable_refs(
        &mut self,
        name: &str,
        factory_id: i32,
        class_id: i32,
        values: Option<&[&dyn Portable]>,
    ) -> Result<()> {
        let nested = match values.and_then(|values| values.first()) {
            Some(first) => self.serializer.class_definition(*first)?.key(),
            None => self.registered(factory_id, class_id)?,
        };
        self.add(name, FieldType::PortableArray, Some(nested))
    }
}
