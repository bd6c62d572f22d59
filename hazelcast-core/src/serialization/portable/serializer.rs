//! Portable serialization framework integration.

use std::sync::Arc;

use super::{
    ClassDefinition, ClassDefinitionWriter, ClassKey, DefaultPortableReader, DefaultPortableWriter,
    Portable, SchemaRegistry,
};
use crate::error::{HazelcastError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// Type identifier for Portable serialization.
pub const PORTABLE_TYPE_ID: i32 = -1;

/// Factory id, class id and version precede every portable body.
const PORTABLE_HEADER_SIZE: usize = 12;

/// Serializer for Portable objects.
///
/// Class definitions are shared through a [`SchemaRegistry`], so a
/// serializer is cheap to clone and every clone sees the same schemas.
#[derive(Debug, Clone)]
pub struct PortableSerializer {
    registry: Arc<SchemaRegistry>,
    portable_version: i32,
}

impl PortableSerializer {
    /// Creates a serializer on top of `registry`. `portable_version` is the
    /// schema version of classes that do not declare their own.
    pub fn new(registry: Arc<SchemaRegistry>, portable_version: i32) -> Self {
        Self {
            registry,
            portable_version,
        }
    }

    /// Returns the shared schema registry.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Returns the default schema version.
    pub fn portable_version(&self) -> i32 {
        self.portable_version
    }

    /// Returns the class key `portable` is written under.
    pub fn class_key(&self, portable: &dyn Portable) -> ClassKey {
        ClassKey::new(
            portable.factory_id(),
            portable.class_id(),
            portable.class_version().unwrap_or(self.portable_version),
        )
    }

    /// Returns the stored definition for `portable`'s class, deriving and
    /// registering it from the object itself on first use.
    pub fn class_definition(&self, portable: &dyn Portable) -> Result<Arc<ClassDefinition>> {
        match self.registry.get(self.class_key(portable)) {
            Some(definition) => Ok(definition),
            None => ClassDefinitionWriter::register(self, portable),
        }
    }

    /// Writes the class header followed by the body of `portable`.
    pub fn write(&self, portable: &dyn Portable, output: &mut ObjectDataOutput) -> Result<()> {
        let definition = self.class_definition(portable)?;
        let key = definition.key();
        output.write_int(key.factory_id)?;
        output.write_int(key.class_id)?;
        output.write_int(key.version)?;
        self.write_body(portable, &definition, output)
    }

    pub(crate) fn write_body(
        &self,
        portable: &dyn Portable,
        definition: &Arc<ClassDefinition>,
        output: &mut ObjectDataOutput,
    ) -> Result<()> {
        let mut writer = DefaultPortableWriter::new(self, Arc::clone(definition), output)?;
        portable.write_portable(&mut writer)?;
        writer.finish()
    }

    /// Reads the class key from the start of a portable payload.
    pub fn read_header(&self, payload: &[u8]) -> Result<ClassKey> {
        let mut input = ObjectDataInput::new(payload);
        Ok(ClassKey::new(
            input.read_int()?,
            input.read_int()?,
            input.read_int()?,
        ))
    }

    /// Makes sure the definition for `payload`, and those of its nested
    /// classes, are stored, fetching them from the cluster if needed.
    pub async fn resolve(&self, payload: &[u8]) -> Result<Arc<ClassDefinition>> {
        let key = self.read_header(payload)?;
        self.registry.resolve(key).await
    }

    /// Returns a random-access reader over `payload`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaUnavailable` if the payload's class has not been
    /// resolved yet.
    pub fn reader<'a>(&'a self, payload: &'a [u8]) -> Result<DefaultPortableReader<'a>> {
        let key = self.read_header(payload)?;
        let definition = self
            .registry
            .get(key)
            .ok_or_else(|| HazelcastError::SchemaUnavailable {
                key,
                reason: "definition not resolved".to_string(),
            })?;
        DefaultPortableReader::new(&self.registry, definition, &payload[PORTABLE_HEADER_SIZE..])
    }

    /// Populates `portable` from `payload`.
    pub fn read_into(&self, payload: &[u8], portable: &mut dyn Portable) -> Result<()> {
        let mut reader = self.reader(payload)?;
        let key = reader.class_definition().key();
        if key.factory_id != portable.factory_id() || key.class_id != portable.class_id() {
            return Err(HazelcastError::Serialization(format!(
                "payload holds {}, target is factory={} class={}",
                key,
                portable.factory_id(),
                portable.class_id()
            )));
        }
        portable.read_portable(&mut reader)
    }
}
