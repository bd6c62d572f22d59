//! Identified data serializable support.
//!
//! Payload layout: `identified flag (1), factoryId i32, classId i32`, then
//! whatever the object writes. Unlike portables there is no schema, so the
//! reader must construct the object through a registered factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{DataInput, DataOutput};
use crate::error::{HazelcastError, Result};

/// Type ID for identified data serializable format.
pub const IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID: i32 = -2;

/// Trait for types serialized with a factory/class id pair and a hand-written body.
pub trait IdentifiedDataSerializable: Send + Sync {
    /// Returns the factory ID for this type.
    fn factory_id(&self) -> i32;

    /// Returns the class ID for this type within its factory.
    fn class_id(&self) -> i32;

    /// Writes the object's data to the output.
    fn write_data(&self, output: &mut dyn DataOutput) -> Result<()>;

    /// Reads the object's data from the input, populating this instance.
    fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()>;
}

/// Creates empty instances for the class ids of one factory.
pub trait DataSerializableFactory: Send + Sync {
    /// Returns a default instance for `class_id`, or `None` if unknown.
    fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>>;
}

impl<F> DataSerializableFactory for F
where
    F: Fn(i32) -> Option<Box<dyn IdentifiedDataSerializable>> + Send + Sync,
{
    fn create(&self, class_id: i32) -> Option<Box<dyn IdentifiedDataSerializable>> {
        self(class_id)
    }
}

/// Writes the identified header and body of `value`.
pub fn write_identified(
    value: &dyn IdentifiedDataSerializable,
    output: &mut dyn DataOutput,
) -> Result<()> {
    output.write_bool(true)?;
    output.write_int(value.factory_id())?;
    output.write_int(value.class_id())?;
    value.write_data(output)
}

fn read_header(input: &mut dyn DataInput) -> Result<(i32, i32)> {
    if !input.read_bool()? {
        return Err(HazelcastError::Serialization(
            "payload is not identified data".to_string(),
        ));
    }
    Ok((input.read_int()?, input.read_int()?))
}

/// Populates `value` from an identified payload, checking the ids first.
pub fn read_identified_into(
    input: &mut dyn DataInput,
    value: &mut dyn IdentifiedDataSerializable,
) -> Result<()> {
    let (factory_id, class_id) = read_header(input)?;
    if factory_id != value.factory_id() || class_id != value.class_id() {
        return Err(HazelcastError::Serialization(format!(
            "payload holds factory={} class={}, target is factory={} class={}",
            factory_id,
            class_id,
            value.factory_id(),
            value.class_id()
        )));
    }
    value.read_data(input)
}

/// Factories keyed by factory id.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<i32, Arc<dyn DataSerializableFactory>>,
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.factories.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("FactoryRegistry")
            .field("factory_ids", &ids)
            .finish()
    }
}

impl FactoryRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. A later registration for the same id replaces
    /// the earlier one.
    pub fn register(&mut self, factory_id: i32, factory: Arc<dyn DataSerializableFactory>) {
        self.factories.insert(factory_id, factory);
    }

    /// Returns `true` if a factory is registered for the given factory ID.
    pub fn contains(&self, factory_id: i32) -> bool {
        self.factories.contains_key(&factory_id)
    }

    /// Returns the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Reads an identified payload into a freshly created instance.
    pub fn read(&self, input: &mut dyn DataInput) -> Result<Box<dyn IdentifiedDataSerializable>> {
        let (factory_id, class_id) = read_header(input)?;
        let mut value = self
            .factories
            .get(&factory_id)
            .and_then(|factory| factory.create(class_id))
            .ok_or_else(|| {
                HazelcastError::Serialization(format!(
                    "no factory creates factory={} class={}",
                    factory_id, class_id
                ))
            })?;
        value.read_data(input)?;
        Ok(value)
    }
}
