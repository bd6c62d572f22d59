//! Class definitions: the schema side of portable serialization.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{HazelcastError, Result};

/// Identifies one version of one portable class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassKey {
    /// Factory the class belongs to.
    pub factory_id: i32,
    /// Class id within the factory.
    pub class_id: i32,
    /// Schema version.
    pub version: i32,
}

impl ClassKey {
    /// Creates a class key.
    pub const fn new(factory_id: i32, class_id: i32, version: i32) -> Self {
        Self {
            factory_id,
            class_id,
            version,
        }
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassKey(factory={}, class={}, version={})",
            self.factory_id, self.class_id, self.version
        )
    }
}

/// Supported field types in portable serialization.
///
/// The discriminant is also the one-byte tag written before every field
/// block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    /// Signed 8-bit integer.
    Byte = 1,
    /// Boolean value.
    Bool = 2,
    /// UTF-16 code unit.
    Char = 3,
    /// Signed 16-bit integer.
    Short = 4,
    /// Signed 32-bit integer.
    Int = 5,
    /// Signed 64-bit integer.
    Long = 6,
    /// 32-bit floating point.
    Float = 7,
    /// 64-bit floating point.
    Double = 8,
    /// UTF-8 string.
    Utf8 = 9,
    /// Nested portable object.
    Portable = 10,
    /// Array of bytes.
    ByteArray = 11,
    /// Array of booleans.
    BoolArray = 12,
    /// Array of chars.
    CharArray = 13,
    /// Array of shorts.
    ShortArray = 14,
    /// Array of ints.
    IntArray = 15,
    /// Array of longs.
    LongArray = 16,
    /// Array of floats.
    FloatArray = 17,
    /// Array of doubles.
    DoubleArray = 18,
    /// Array of strings.
    Utf8Array = 19,
    /// Array of portable objects.
    PortableArray = 20,
}

impl FieldType {
    /// Creates a field type from its tag.
    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            1 => Self::Byte,
            2 => Self::Bool,
            3 => Self::Char,
            4 => Self::Short,
            5 => Self::Int,
            6 => Self::Long,
            7 => Self::Float,
            8 => Self::Double,
            9 => Self::Utf8,
            10 => Self::Portable,
            11 => Self::ByteArray,
            12 => Self::BoolArray,
            13 => Self::CharArray,
            14 => Self::ShortArray,
            15 => Self::IntArray,
            16 => Self::LongArray,
            17 => Self::FloatArray,
            18 => Self::DoubleArray,
            19 => Self::Utf8Array,
            20 => Self::PortableArray,
            _ => {
                return Err(HazelcastError::Serialization(format!(
                    "unknown field type id: {}",
                    id
                )))
            }
        })
    }

    /// Returns the tag of this field type.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Returns true for the two field types that embed other portables.
    pub fn is_portable(self) -> bool {
        matches!(self, Self::Portable | Self::PortableArray)
    }

    /// Returns true if this is an array type.
    pub fn is_array(self) -> bool {
        self.id() >= Self::ByteArray.id()
    }

    fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Utf8 => "utf",
            Self::Portable => "portable",
            Self::ByteArray => "byte[]",
            Self::BoolArray => "bool[]",
            Self::CharArray => "char[]",
            Self::ShortArray => "short[]",
            Self::IntArray => "int[]",
            Self::LongArray => "long[]",
            Self::FloatArray => "float[]",
            Self::DoubleArray => "double[]",
            Self::Utf8Array => "utf[]",
            Self::PortableArray => "portable[]",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Definition of a single field within a portable class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    name: String,
    field_type: FieldType,
    index: usize,
    nested: Option<ClassKey>,
}

impl FieldDefinition {
    /// Creates a field definition for a primitive, string or array field.
    pub fn new(name: impl Into<String>, field_type: FieldType, index: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            index,
            nested: None,
        }
    }

    /// Creates a field definition for a nested portable or portable array.
    pub fn new_nested(
        name: impl Into<String>,
        field_type: FieldType,
        index: usize,
        nested: ClassKey,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            index,
            nested: Some(nested),
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns the 0-based position of the field in the offset table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the class of the embedded portable(s), if any.
    pub fn nested_key(&self) -> Option<ClassKey> {
        self.nested
    }
}

/// The schema of one portable class version.
///
/// Embedded portable classes are referenced by [`ClassKey`] only; their
/// definitions live next to this one in the
/// [`SchemaRegistry`](super::SchemaRegistry).
#[derive(Debug, Clone)]
pub struct ClassDefinition {
    key: ClassKey,
    fields: Vec<FieldDefinition>,
    field_indices: HashMap<String, usize>,
    nested: BTreeSet<ClassKey>,
}

impl ClassDefinition {
    /// Creates a class definition, validating the field list.
    ///
    /// # Errors
    ///
    /// Fails if names repeat, if indices are not `0..n` in order, if a
    /// portable field lacks its nested class key, or if any other field
    /// carries one.
    pub fn new(key: ClassKey, fields: Vec<FieldDefinition>) -> Result<Self> {
        let mut field_indices = HashMap::with_capacity(fields.len());
        let mut nested = BTreeSet::new();

        for (position, field) in fields.iter().enumerate() {
            if field.index != position {
                return Err(HazelcastError::Serialization(format!(
                    "{}: field '{}' has index {} at position {}",
                    key, field.name, field.index, position
                )));
            }
            if field_indices.insert(field.name.clone(), position).is_some() {
                return Err(HazelcastError::Serialization(format!(
                    "{}: duplicate field '{}'",
                    key, field.name
                )));
            }
            match (field.field_type.is_portable(), field.nested) {
                (true, Some(nested_key)) => {
                    nested.insert(nested_key);
                }
                (true, None) => {
                    return Err(HazelcastError::Serialization(format!(
                        "{}: portable field '{}' has no nested class",
                        key, field.name
                    )))
                }
                (false, Some(nested_key)) => {
                    return Err(HazelcastError::Serialization(format!(
                        "{}: {} field '{}' cannot embed {}",
                        key, field.field_type, field.name, nested_key
                    )))
                }
                (false, None) => {}
            }
        }

        Ok(Self {
            key,
            fields,
            field_indices,
            nested,
        })
    }

    /// Returns the class key.
    pub fn key(&self) -> ClassKey {
        self.key
    }

    /// Returns the factory id.
    pub fn factory_id(&self) -> i32 {
        self.key.factory_id
    }

    /// Returns the class id.
    pub fn class_id(&self) -> i32 {
        self.key.class_id
    }

    /// Returns the schema version.
    pub fn version(&self) -> i32 {
        self.key.version
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Returns the fields in index order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns true if a field with the given name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// Returns the keys of all embedded portable classes.
    pub fn nested_keys(&self) -> &BTreeSet<ClassKey> {
        &self.nested
    }

    /// Describes the first difference between two field lists, if any.
    pub(crate) fn difference(&self, other: &ClassDefinition) -> Option<String> {
        if self.fields.len() != other.fields.len() {
            return Some(format!(
                "field count {} differs from {}",
                other.fields.len(),
                self.fields.len()
            ));
        }
        self.fields
            .iter()
            .zip(&other.fields)
            .find(|(a, b)| a != b)
            .map(|(a, b)| {
                format!(
                    "field {} is '{}': {} but was '{}': {}",
                    a.index, b.name, b.field_type, a.name, a.field_type
                )
            })
    }
}

/// Structural equality: same key and same field list.
impl PartialEq for ClassDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

impl Eq for ClassDefinition {}

/// Builds a [`ClassDefinition`] by appending fields in index order.
#[derive(Debug)]
pub struct ClassDefinitionBuilder {
    key: ClassKey,
    fields: Vec<FieldDefinition>,
}

impl ClassDefinitionBuilder {
    /// Starts a definition for the given class.
    pub fn new(factory_id: i32, class_id: i32, version: i32) -> Self {
        Self {
            key: ClassKey::new(factory_id, class_id, version),
            fields: Vec::new(),
        }
    }

    /// Appends a primitive, string or array field.
    pub fn add_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        let index = self.fields.len();
        self.fields.push(FieldDefinition::new(name, field_type, index));
        self
    }

    /// Appends a nested portable field of the given class.
    pub fn add_portable_field(mut self, name: impl Into<String>, nested: ClassKey) -> Self {
        let index = self.fields.len();
        self.fields.push(FieldDefinition::new_nested(
            name,
            FieldType::Portable,
            index,
            nested,
        ));
        self
    }

    /// Appends a portable array field of the given class.
    pub fn add_portable_array_field(mut self, name: impl Into<String>, nested: ClassKey) -> Self {
        let index = self.fields.len();
        self.fields.push(FieldDefinition::new_nested(
            name,
            FieldType::PortableArray,
            index,
            nested,
        ));
        self
    }

    /// Validates and returns the definition.
    pub fn build(self) -> Result<ClassDefinition> {
        ClassDefinition::new(self.key, self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_tags() {
        for id in 1..=20u8 {
            assert_eq!(FieldType::from_id(id).unwrap().id(), id);
        }
        assert!(FieldType::from_id(0).is_err());
        assert!(FieldType::from_id(21).is_err());
        assert!(FieldType::IntArray.is_array());
        assert!(!FieldType::Portable.is_array());
        assert!(FieldType::PortableArray.is_portable());
        assert_eq!(FieldType::Utf8.to_string(), "utf");
    }

    #[test]
    fn test_builder_indexes_fields() {
        let address = ClassKey::new(1, 2, 0);
        let def = ClassDefinitionBuilder::new(1, 1, 0)
            .add_field("age", FieldType::Int)
            .add_field("name", FieldType::Utf8)
            .add_portable_field("home", address)
            .build()
            .unwrap();

        assert_eq!(def.key(), ClassKey::new(1, 1, 0));
        assert_eq!(def.field_count(), 3);
        assert_eq!(def.field("name").unwrap().index(), 1);
        assert_eq!(def.field("home").unwrap().nested_key(), Some(address));
        assert!(def.nested_keys().contains(&address));
        assert!(!def.has_field("missing"));
    }

    #[test]
    fn test_invalid_field_lists() {
        let key = ClassKey::new(1, 1, 0);
        let dup = vec![
            FieldDefinition::new("a", FieldType::Int, 0),
            FieldDefinition::new("a", FieldType::Long, 1),
        ];
        assert!(ClassDefinition::new(key, dup).is_err());

        let gap = vec![FieldDefinition::new("a", FieldType::Int, 1)];
        assert!(ClassDefinition::new(key, gap).is_err());

        let no_nested = vec![FieldDefinition::new("p", FieldType::Portable, 0)];
        assert!(ClassDefinition::new(key, no_nested).is_err());
    }

    #[test]
    fn test_plain_field_with_nested_key_is_rejected() {
        let key = ClassKey::new(1, 1, 0);
        for field_type in [FieldType::Int, FieldType::Utf8, FieldType::IntArray] {
            let fields = vec![FieldDefinition::new_nested(
                "n",
                field_type,
                0,
                ClassKey::new(1, 2, 0),
            )];
            let err = ClassDefinition::new(key, fields).unwrap_err();
            assert!(matches!(err, HazelcastError::Serialization(_)), "{field_type}: {err}");
        }
    }

    #[test]
    fn test_structural_equality_and_difference() {
        let a = ClassDefinitionBuilder::new(1, 1, 0)
            .add_field("age", FieldType::Int)
            .build()
            .unwrap();
        let b = ClassDefinitionBuilder::new(1, 1, 0)
            .add_field("age", FieldType::Int)
            .build()
            .unwrap();
        let c = ClassDefinitionBuilder::new(1, 1, 0)
            .add_field("age", FieldType::Long)
            .build()
            .unwrap();

        assert_eq!(a, b);
        assert!(a.difference(&b).is_none());
        assert_ne!(a, c);
        assert!(a.difference(&c).unwrap().contains("long"));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            ClassKey::new(1, 2, 3).to_string(),
            "ClassKey(factory=1, class=2, version=3)"
        );
    }
}
