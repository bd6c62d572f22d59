//! Conversion between application values and [`Data`].

use std::sync::Arc;

use tracing::trace;

use super::data::*;
use super::identified::{read_identified_into, write_identified, FactoryRegistry};
use super::portable::{
    DefaultPortableReader, Portable, PortableSerializer, SchemaRegistry, PORTABLE_TYPE_ID,
};
use super::{
    Deserializable, IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput, Serializable,
    IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
};
use crate::error::{HazelcastError, Result};
use crate::partition::{compute_partition_hash, PartitionAware};

/// Values that can be turned into [`Data`].
///
/// Implemented for the builtin types and for every [`Portable`].
pub trait ToData {
    /// Type id written into the data header.
    fn data_type_id(&self) -> i32;

    /// Writes the payload that follows the data header.
    fn write_payload(
        &self,
        service: &SerializationService,
        output: &mut ObjectDataOutput,
    ) -> Result<()>;
}

/// Values that can be read back from [`Data`].
///
/// Portable schemas must already be resolved when this runs;
/// [`SerializationService::to_object`] takes care of that.
pub trait FromData: Sized {
    /// Reads a value from a payload of the given type id.
    fn read_payload(type_id: i32, payload: &[u8], service: &SerializationService) -> Result<Self>;
}

fn expect_type_id(actual: i32, expected: i32) -> Result<()> {
    if actual != expected {
        return Err(HazelcastError::Serialization(format!(
            "data has type id {}, expected {}",
            actual, expected
        )));
    }
    Ok(())
}

macro_rules! builtin_data {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToData for $ty {
                fn data_type_id(&self) -> i32 {
                    <$ty as Serializable>::TYPE_ID
                }

                fn write_payload(
                    &self,
                    _service: &SerializationService,
                    output: &mut ObjectDataOutput,
                ) -> Result<()> {
                    self.serialize(output)
                }
            }

            impl FromData for $ty {
                fn read_payload(
                    type_id: i32,
                    payload: &[u8],
                    _service: &SerializationService,
                ) -> Result<Self> {
                    expect_type_id(type_id, <$ty as Deserializable>::TYPE_ID)?;
                    <$ty as Deserializable>::deserialize(&mut ObjectDataInput::new(payload))
                }
            }
        )*
    };
}

builtin_data!(i8, bool, char, i16, i32, i64, f32, f64, String, Vec<u8>);

impl ToData for str {
    fn data_type_id(&self) -> i32 {
        STRING_TYPE_ID
    }

    fn write_payload(
        &self,
        _service: &SerializationService,
        output: &mut ObjectDataOutput,
    ) -> Result<()> {
        self.serialize(output)
    }
}

impl<T: Portable> ToData for T {
    fn data_type_id(&self) -> i32 {
        PORTABLE_TYPE_ID
    }

    fn write_payload(
        &self,
        service: &SerializationService,
        output: &mut ObjectDataOutput,
    ) -> Result<()> {
        service.portable.write(self, output)
    }
}

impl<T: Portable + Default> FromData for T {
    fn read_payload(type_id: i32, payload: &[u8], service: &SerializationService) -> Result<Self> {
        expect_type_id(type_id, PORTABLE_TYPE_ID)?;
        let mut value = T::default();
        service.portable.read_into(payload, &mut value)?;
        Ok(value)
    }
}

/// Entry point for turning values into [`Data`] and back.
///
/// Cloning is cheap; clones share the schema registry and factories.
#[derive(Debug, Clone)]
pub struct SerializationService {
    portable: PortableSerializer,
    factories: Arc<FactoryRegistry>,
}

impl SerializationService {
    /// Creates a service over a shared schema registry.
    pub fn new(
        registry: Arc<SchemaRegistry>,
        portable_version: i32,
        factories: FactoryRegistry,
    ) -> Self {
        Self {
            portable: PortableSerializer::new(registry, portable_version),
            factories: Arc::new(factories),
        }
    }

    /// Returns the portable serializer.
    pub fn portable(&self) -> &PortableSerializer {
        &self.portable
    }

    /// Returns the schema registry.
    pub fn schema_registry(&self) -> &Arc<SchemaRegistry> {
        self.portable.registry()
    }

    /// Serializes `value`. The partition hash is derived from the payload.
    pub fn to_data<T: ToData + ?Sized>(&self, value: &T) -> Result<Data> {
        let mut output = ObjectDataOutput::new();
        value.write_payload(self, &mut output)?;
        Ok(Data::new(value.data_type_id(), 0, output.as_bytes()))
    }

    /// Serializes `value` with the partition hash taken from `key`, so that
    /// it routes like every other value sharing that partition key.
    pub fn to_partitioned_data<T: ToData + ?Sized>(
        &self,
        value: &T,
        key: &dyn PartitionAware,
    ) -> Result<Data> {
        let mut output = ObjectDataOutput::new();
        value.write_payload(self, &mut output)?;
        let hash = compute_partition_hash(&key.partition_key_bytes());
        Ok(Data::new(value.data_type_id(), hash, output.as_bytes()))
    }

    /// Serializes an identified data serializable value.
    pub fn identified_to_data(&self, value: &dyn IdentifiedDataSerializable) -> Result<Data> {
        let mut output = ObjectDataOutput::new();
        write_identified(value, &mut output)?;
        Ok(Data::new(
            IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID,
            0,
            output.as_bytes(),
        ))
    }

    /// Deserializes `data`, first fetching any portable class definitions
    /// it needs.
    ///
    /// # Errors
    ///
    /// Returns `SchemaUnavailable` if a needed definition cannot be fetched
    /// and `Serialization` if `data` is not of type `T`.
    pub async fn to_object<T: FromData>(&self, data: &Data) -> Result<T> {
        if data.type_id() == PORTABLE_TYPE_ID {
            self.portable.resolve(data.payload()).await?;
        }
        trace!(type_id = data.type_id(), len = data.len(), "deserializing");
        T::read_payload(data.type_id(), data.payload(), self)
    }

    /// Returns a random-access reader over portable `data`, fetching its
    /// class definitions first if needed.
    pub async fn portable_reader<'a>(
        &'a self,
        data: &'a Data,
    ) -> Result<DefaultPortableReader<'a>> {
        expect_type_id(data.type_id(), PORTABLE_TYPE_ID)?;
        self.portable.resolve(data.payload()).await?;
        self.portable.reader(data.payload())
    }

    /// Deserializes identified `data` through the registered factories.
    pub fn identified_to_object(
        &self,
        data: &Data,
    ) -> Result<Box<dyn IdentifiedDataSerializable>> {
        expect_type_id(data.type_id(), IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID)?;
        self.factories.read(&mut ObjectDataInput::new(data.payload()))
    }

    /// Populates `value` from identified `data`.
    pub fn identified_into(
        &self,
        data: &Data,
        value: &mut dyn IdentifiedDataSerializable,
    ) -> Result<()> {
        expect_type_id(data.type_id(), IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID)?;
        read_identified_into(&mut ObjectDataInput::new(data.payload()), value)
    }
}

impl Default for SerializationService {
    fn default() -> Self {
        Self::new(Arc::new(SchemaRegistry::default()), 0, FactoryRegistry::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::portable::{
        ClassDefinition, ClassDefinitionSource, ClassKey, PortableReader, PortableWriter,
    };
    use crate::serialization::{DataInput, DataOutput};
    use async_trait::async_trait;

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        age: i32,
        name: String,
    }

    impl Portable for Person {
        fn factory_id(&self) -> i32 {
            1
        }

        fn class_id(&self) -> i32 {
            1
        }

        fn write_portable(&self, writer: &mut dyn PortableWriter) -> Result<()> {
            writer.write_int("age", self.age)?;
            writer.write_string("name", Some(&self.name))
        }

        fn read_portable(&mut self, reader: &mut dyn PortableReader) -> Result<()> {
            self.age = reader.read_int("age")?;
            self.name = reader.read_string("name")?.unwrap_or_default();
            Ok(())
        }
    }

    struct Customer(&'static str);

    impl PartitionAware for Customer {
        fn partition_key_bytes(&self) -> Vec<u8> {
            self.0.as_bytes().to_vec()
        }
    }

    struct RegistrySource(Arc<SchemaRegistry>);

    #[async_trait]
    impl ClassDefinitionSource for RegistrySource {
        async fn fetch(&self, key: ClassKey) -> Result<Option<ClassDefinition>> {
            Ok(self.0.get(key).map(|d| (*d).clone()))
        }
    }

    #[tokio::test]
    async fn test_builtin_values() {
        let service = SerializationService::default();

        let data = service.to_data(&42i32).unwrap();
        assert_eq!(data.type_id(), INTEGER_TYPE_ID);
        assert_eq!(service.to_object::<i32>(&data).await.unwrap(), 42);

        let data = service.to_data("key-1").unwrap();
        assert_eq!(service.to_object::<String>(&data).await.unwrap(), "key-1");
        assert_eq!(data, service.to_data(&"key-1".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_wrong_target_type() {
        let service = SerializationService::default();
        let data = service.to_data(&42i32).unwrap();
        assert!(service.to_object::<String>(&data).await.is_err());
        assert!(service.to_object::<Person>(&data).await.is_err());
    }

    #[tokio::test]
    async fn test_portable_round_trip() {
        let service = SerializationService::default();
        let person = Person {
            age: 30,
            name: "ali".to_string(),
        };
        let data = service.to_data(&person).unwrap();
        assert_eq!(data.type_id(), PORTABLE_TYPE_ID);
        assert_eq!(service.to_object::<Person>(&data).await.unwrap(), person);

        let mut reader = service.portable_reader(&data).await.unwrap();
        assert_eq!(reader.read_string("name").unwrap().as_deref(), Some("ali"));
    }

    #[tokio::test]
    async fn test_unknown_schema_is_fetched() {
        let writer = SerializationService::default();
        let data = writer
            .to_data(&Person {
                age: 7,
                name: "kim".to_string(),
            })
            .unwrap();

        let reader = SerializationService::default();
        reader
            .schema_registry()
            .set_source(Arc::new(RegistrySource(Arc::clone(writer.schema_registry()))));
        let person: Person = reader.to_object(&data).await.unwrap();
        assert_eq!(person.name, "kim");
        assert_eq!(reader.schema_registry().len(), 1);
    }

    #[test]
    fn test_partition_aware_hash() {
        let service = SerializationService::default();
        let a = service.to_partitioned_data("order-1", &Customer("c-9")).unwrap();
        let b = service.to_partitioned_data("order-2", &Customer("c-9")).unwrap();
        assert_eq!(a.partition_hash(), b.partition_hash());
        assert_eq!(a.partition_hash(), compute_partition_hash(b"c-9"));
    }

    #[test]
    fn test_identified_values() {
        #[derive(Default)]
        struct Counter(i64);

        impl IdentifiedDataSerializable for Counter {
            fn factory_id(&self) -> i32 {
                5
            }

            fn class_id(&self) -> i32 {
                1
            }

            fn write_data(&self, output: &mut dyn DataOutput) -> Result<()> {
                output.write_long(self.0)
            }

            fn read_data(&mut self, input: &mut dyn DataInput) -> Result<()> {
                self.0 = input.read_long()?;
                Ok(())
            }
        }

        let mut factories = FactoryRegistry::new();
        factories.register(
            5,
            Arc::new(|_: i32| {
                Some(Box::new(Counter::default()) as Box<dyn IdentifiedDataSerializable>)
            }),
        );
        let service =
            SerializationService::new(Arc::new(SchemaRegistry::default()), 0, factories);

        let data = service.identified_to_data(&Counter(11)).unwrap();
        assert_eq!(data.type_id(), IDENTIFIED_DATA_SERIALIZABLE_TYPE_ID);
        assert_eq!(service.identified_to_object(&data).unwrap().class_id(), 1);

        let mut counter = Counter::default();
        service.identified_into(&data, &mut counter).unwrap();
        assert_eq!(counter.0, 11);
    }
}
