//! Client service codecs: session setup, partition table, heartbeat and
//! class definition lookup.

use std::fmt;
use std::net::SocketAddr;

use super::*;
use crate::protocol::builder::{nullable_string_size, string_size};
use crate::serialization::portable::{ClassDefinition, ClassKey, FieldDefinition, FieldType};

/// A member address as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: i32,
}

impl Address {
    /// Creates an address.
    pub fn new(host: impl Into<String>, port: i32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Converts an IP-literal address into a socket address.
    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        let port = u16::try_from(self.port)
            .map_err(|_| HazelcastError::Protocol(format!("invalid port {}", self.port)))?;
        let ip = self
            .host
            .parse()
            .map_err(|e| HazelcastError::Protocol(format!("invalid host '{}': {}", self.host, e)))?;
        Ok(SocketAddr::new(ip, port))
    }

    fn wire_size(&self) -> usize {
        string_size(&self.host) + INT_SIZE
    }

    fn put(&self, builder: &mut FrameBuilder) {
        builder.put_str(&self.host).put_i32(self.port);
    }

    fn get(reader: &mut FrameReader<'_>) -> Result<Self> {
        Ok(Self {
            host: reader.get_str()?,
            port: reader.get_i32()?,
        })
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), i32::from(addr.port()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of an authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationStatus {
    /// The session is established.
    Authenticated,
    /// Cluster name or password were rejected.
    CredentialsFailed,
    /// The member uses a different serialization version.
    SerializationVersionMismatch,
}

impl AuthenticationStatus {
    /// Returns the wire value.
    pub fn value(self) -> u8 {
        match self {
            Self::Authenticated => 0,
            Self::CredentialsFailed => 1,
            Self::SerializationVersionMismatch => 2,
        }
    }

    /// Parses a wire value.
    pub fn from_value(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Authenticated),
            1 => Ok(Self::CredentialsFailed),
            2 => Ok(Self::SerializationVersionMismatch),
            other => Err(HazelcastError::Protocol(format!(
                "unknown authentication status {}",
                other
            ))),
        }
    }
}

/// Opens a session on a fresh connection.
///
/// Not retryable: a resent request would open a second session for the
/// same client.
#[derive(Debug, Clone, Copy)]
pub struct ClientAuthenticationCodec<'a> {
    /// User or cluster name.
    pub username: &'a str,
    /// Password.
    pub password: &'a str,
    /// Uuid assigned by a previous session, if reconnecting.
    pub uuid: Option<&'a str>,
    /// Uuid of the owner member of a previous session.
    pub owner_uuid: Option<&'a str>,
    /// Whether this connection becomes the owner connection.
    pub is_owner_connection: bool,
    /// Client implementation tag.
    pub client_type: &'a str,
    /// Serialization version the client speaks.
    pub serialization_version: u8,
}

/// Decoded authentication result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    /// Outcome.
    pub status: AuthenticationStatus,
    /// Address of the authenticating member.
    pub address: Option<Address>,
    /// Uuid assigned to this client.
    pub uuid: Option<String>,
    /// Uuid of the owner member.
    pub owner_uuid: Option<String>,
}

impl AuthenticationResponse {
    /// Encodes this result as a response frame. Used by members and test
    /// doubles.
    pub fn encode(&self) -> Frame {
        let size = HEADER_SIZE
            + BYTE_SIZE
            + BOOLEAN_SIZE
            + self.address.as_ref().map_or(0, Address::wire_size)
            + nullable_string_size(self.uuid.as_deref())
            + nullable_string_size(self.owner_uuid.as_deref());
        let mut builder = FrameBuilder::new(RESPONSE_AUTHENTICATION, size);
        builder.put_u8(self.status.value());
        match &self.address {
            Some(address) => {
                builder.put_bool(false);
                address.put(&mut builder);
            }
            None => {
                builder.put_bool(true);
            }
        }
        builder
            .put_nullable_str(self.uuid.as_deref())
            .put_nullable_str(self.owner_uuid.as_deref());
        builder.finish()
    }
}

impl OperationCodec for ClientAuthenticationCodec<'_> {
    type Response = AuthenticationResponse;

    const NAME: &'static str = "Client.authentication";
    const REQUEST_TYPE: u16 = CLIENT_AUTHENTICATION;
    const RESPONSE_TYPE: u16 = RESPONSE_AUTHENTICATION;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE
            + string_size(self.username)
            + string_size(self.password)
            + nullable_string_size(self.uuid)
            + nullable_string_size(self.owner_uuid)
            + BOOLEAN_SIZE
            + string_size(self.client_type)
            + BYTE_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.username)
            .put_str(self.password)
            .put_nullable_str(self.uuid)
            .put_nullable_str(self.owner_uuid)
            .put_bool(self.is_owner_connection)
            .put_str(self.client_type)
            .put_u8(self.serialization_version);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<AuthenticationResponse> {
        let status = AuthenticationStatus::from_value(reader.get_u8()?)?;
        let address = if reader.get_bool()? {
            None
        } else {
            Some(Address::get(reader)?)
        };
        Ok(AuthenticationResponse {
            status,
            address,
            uuid: reader.get_nullable_str()?,
            owner_uuid: reader.get_nullable_str()?,
        })
    }
}

/// The partitions owned by one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionOwnership {
    /// Owning member.
    pub address: Address,
    /// Partition ids it owns.
    pub partitions: Vec<i32>,
}

/// Fetches the partition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientGetPartitionsCodec;

impl ClientGetPartitionsCodec {
    /// Encodes a partition table response. Used by members and test doubles.
    pub fn encode_response(owners: &[PartitionOwnership]) -> Frame {
        let size = HEADER_SIZE
            + INT_SIZE
            + owners
                .iter()
                .map(|o| o.address.wire_size() + INT_SIZE + o.partitions.len() * INT_SIZE)
                .sum::<usize>();
        let mut builder = FrameBuilder::new(RESPONSE_PARTITIONS, size);
        builder.put_i32(owners.len() as i32);
        for owner in owners {
            owner.address.put(&mut builder);
            builder.put_i32(owner.partitions.len() as i32);
            for &partition in &owner.partitions {
                builder.put_i32(partition);
            }
        }
        builder.finish()
    }
}

impl OperationCodec for ClientGetPartitionsCodec {
    type Response = Vec<PartitionOwnership>;

    const NAME: &'static str = "Client.getPartitions";
    const REQUEST_TYPE: u16 = CLIENT_GET_PARTITIONS;
    const RESPONSE_TYPE: u16 = RESPONSE_PARTITIONS;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE
    }

    fn encode_payload(&self, _builder: &mut FrameBuilder) {}

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<PartitionOwnership>> {
        let count = read_count(reader)?;
        let mut owners = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            let address = Address::get(reader)?;
            let partition_count = read_count(reader)?;
            let mut partitions = Vec::with_capacity(partition_count.min(reader.remaining()));
            for _ in 0..partition_count {
                partitions.push(reader.get_i32()?);
            }
            owners.push(PartitionOwnership {
                address,
                partitions,
            });
        }
        Ok(owners)
    }
}

/// Heartbeat on an otherwise idle connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientPingCodec;

impl OperationCodec for ClientPingCodec {
    type Response = ();

    const NAME: &'static str = "Client.ping";
    const REQUEST_TYPE: u16 = CLIENT_PING;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE
    }

    fn encode_payload(&self, _builder: &mut FrameBuilder) {}

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Asks the cluster for a portable class definition it knows.
#[derive(Debug, Clone, Copy)]
pub struct ClientFetchClassDefinitionCodec {
    /// Class to fetch.
    pub key: ClassKey,
}

impl ClientFetchClassDefinitionCodec {
    /// Reads the requested key from a request frame. Used by members and
    /// test doubles.
    pub fn decode_request(frame: &Frame) -> Result<ClassKey> {
        expect_message_type(frame, CLIENT_FETCH_CLASS_DEFINITION)?;
        let mut reader = frame.reader();
        get_class_key(&mut reader)
    }

    /// Encodes a nullable class definition response. Used by members and
    /// test doubles.
    pub fn encode_response(definition: Option<&ClassDefinition>) -> Frame {
        let size = HEADER_SIZE + BOOLEAN_SIZE + definition.map_or(0, class_definition_size);
        let mut builder = FrameBuilder::new(RESPONSE_CLASS_DEFINITION, size);
        match definition {
            Some(definition) => {
                builder.put_bool(false);
                put_class_definition(&mut builder, definition);
            }
            None => {
                builder.put_bool(true);
            }
        }
        builder.finish()
    }
}

impl OperationCodec for ClientFetchClassDefinitionCodec {
    type Response = Option<ClassDefinition>;

    const NAME: &'static str = "Client.fetchClassDefinition";
    const REQUEST_TYPE: u16 = CLIENT_FETCH_CLASS_DEFINITION;
    const RESPONSE_TYPE: u16 = RESPONSE_CLASS_DEFINITION;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + CLASS_KEY_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        put_class_key(builder, self.key);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<ClassDefinition>> {
        if reader.get_bool()? {
            return Ok(None);
        }
        get_class_definition(reader).map(Some)
    }
}

const CLASS_KEY_SIZE: usize = 3 * INT_SIZE;

fn put_class_key(builder: &mut FrameBuilder, key: ClassKey) {
    builder
        .put_i32(key.factory_id)
        .put_i32(key.class_id)
        .put_i32(key.version);
}

fn get_class_key(reader: &mut FrameReader<'_>) -> Result<ClassKey> {
    Ok(ClassKey::new(reader.get_i32()?, reader.get_i32()?, reader.get_i32()?))
}

fn read_count(reader: &mut FrameReader<'_>) -> Result<usize> {
    let count = reader.get_i32()?;
    usize::try_from(count)
        .map_err(|_| HazelcastError::Protocol(format!("negative element count {}", count)))
}

// Definition layout: key, field count, then per field
// `name, type tag, [nested key if the type embeds portables]`.

fn class_definition_size(definition: &ClassDefinition) -> usize {
    CLASS_KEY_SIZE
        + INT_SIZE
        + definition
            .fields()
            .iter()
            .map(|f| {
                let nested = if f.nested_key().is_some() {
                    CLASS_KEY_SIZE
                } else {
                    0
                };
                string_size(f.name()) + BYTE_SIZE + nested
            })
            .sum::<usize>()
}

fn put_class_definition(builder: &mut FrameBuilder, definition: &ClassDefinition) {
    put_class_key(builder, definition.key());
    builder.put_i32(definition.field_count() as i32);
    for field in definition.fields() {
        builder.put_str(field.name()).put_u8(field.field_type().id());
        if let Some(nested) = field.nested_key() {
            put_class_key(builder, nested);
        }
    }
}

fn get_class_definition(reader: &mut FrameReader<'_>) -> Result<ClassDefinition> {
    let key = get_class_key(reader)?;
    let count = read_count(reader)?;
    let mut fields = Vec::with_capacity(count.min(reader.remaining()));
    for index in 0..count {
        let name = reader.get_str()?;
        let field_type = FieldType::from_id(reader.get_u8()?)?;
        let field = if field_type.is_portable() {
            FieldDefinition::new_nested(name, field_type, index, get_class_key(reader)?)
        } else {
            FieldDefinition::new(name, field_type, index)
        };
        fields.push(field);
    }
    ClassDefinition::new(key, fields)
}

/// Registers the client service codecs.
pub fn register(registry: &mut CodecRegistry) {
    registry.register::<ClientAuthenticationCodec<'static>>();
    registry.register::<ClientGetPartitionsCodec>();
    registry.register::<ClientPingCodec>();
    registry.register::<ClientFetchClassDefinitionCodec>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::portable::ClassDefinitionBuilder;

    #[test]
    fn test_authentication_request_layout() {
        let codec = ClientAuthenticationCodec {
            username: "dev",
            password: "dev-pass",
            uuid: None,
            owner_uuid: Some("owner-1"),
            is_owner_connection: true,
            client_type: "RST",
            serialization_version: 1,
        };
        let frame = codec.encode_request();
        assert_eq!(frame.len(), codec.calculate_data_size());
        assert!(!frame.is_retryable());

        let mut reader = frame.reader();
        assert_eq!(reader.get_str().unwrap(), "dev");
        assert_eq!(reader.get_str().unwrap(), "dev-pass");
        assert_eq!(reader.get_nullable_str().unwrap(), None);
        assert_eq!(reader.get_nullable_str().unwrap().as_deref(), Some("owner-1"));
        assert!(reader.get_bool().unwrap());
        assert_eq!(reader.get_str().unwrap(), "RST");
        assert_eq!(reader.get_u8().unwrap(), 1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_authentication_response() {
        let response = AuthenticationResponse {
            status: AuthenticationStatus::Authenticated,
            address: Some(Address::new("127.0.0.1", 5701)),
            uuid: Some("client-1".to_string()),
            owner_uuid: None,
        };
        let decoded = ClientAuthenticationCodec::decode_response(&response.encode()).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(
            decoded.address.unwrap().to_socket_addr().unwrap(),
            "127.0.0.1:5701".parse().unwrap()
        );
    }

    #[test]
    fn test_partitions_response() {
        let owners = vec![
            PartitionOwnership {
                address: Address::new("10.0.0.1", 5701),
                partitions: vec![0, 2],
            },
            PartitionOwnership {
                address: Address::new("10.0.0.2", 5701),
                partitions: vec![1],
            },
        ];
        let frame = ClientGetPartitionsCodec::encode_response(&owners);
        assert_eq!(ClientGetPartitionsCodec::decode_response(&frame).unwrap(), owners);
    }

    #[test]
    fn test_class_definition_exchange() {
        let address = ClassKey::new(1, 2, 0);
        let definition = ClassDefinitionBuilder::new(1, 3, 0)
            .add_field("id", FieldType::Long)
            .add_portable_field("home", address)
            .add_field("tags", FieldType::Utf8Array)
            .build()
            .unwrap();

        let request = ClientFetchClassDefinitionCodec {
            key: definition.key(),
        }
        .encode_request();
        assert!(request.is_retryable());
        assert_eq!(
            ClientFetchClassDefinitionCodec::decode_request(&request).unwrap(),
            definition.key()
        );

        let frame = ClientFetchClassDefinitionCodec::encode_response(Some(&definition));
        let decoded = ClientFetchClassDefinitionCodec::decode_response(&frame)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, definition);
        assert_eq!(decoded.field("home").unwrap().nested_key(), Some(address));

        let missing = ClientFetchClassDefinitionCodec::encode_response(None);
        assert_eq!(ClientFetchClassDefinitionCodec::decode_response(&missing).unwrap(), None);
    }

    #[test]
    fn test_unknown_status() {
        assert!(AuthenticationStatus::from_value(7).is_err());
    }
}
