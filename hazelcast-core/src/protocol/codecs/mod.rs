//! Per-operation request/response codecs.
//!
//! Each operation implements [`OperationCodec`] once: it knows its exact
//! encoded size, how to write its arguments, how to read its result and
//! whether the operation may be resent after a connection loss. The
//! [`CodecRegistry`] indexes the static part of every codec by request
//! message type.

pub mod client;
pub mod list;
pub mod lock;
pub mod map;
pub mod multimap;
pub mod queue;
pub mod transaction;
pub mod transactional;

use std::collections::HashMap;

use super::builder::FrameBuilder;
use super::constants::*;
use super::frame::Frame;
use super::reader::FrameReader;
use crate::error::{HazelcastError, Result};
use crate::partition::name_partition_hash;
use crate::serialization::Data;

/// Uniform encode/decode contract implemented once per operation.
pub trait OperationCodec {
    /// Decoded result of the operation.
    type Response;

    /// Operation name used in logs.
    const NAME: &'static str;
    /// Message type of the request.
    const REQUEST_TYPE: u16;
    /// Message type the response must carry.
    const RESPONSE_TYPE: u16;
    /// Whether resending after a connection loss is safe for this operation.
    const RETRYABLE: bool;

    /// Exact encoded size of the request, header included.
    fn calculate_data_size(&self) -> usize;

    /// Writes the request arguments after the header.
    fn encode_payload(&self, builder: &mut FrameBuilder);

    /// Reads the response parameters.
    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Self::Response>;

    /// Key used for partition routing, if the operation is key-scoped.
    fn partition_key(&self) -> Option<&Data> {
        None
    }

    /// Partition hash the request routes by. Defaults to the hash of
    /// [`partition_key`](Self::partition_key); operations scoped to a
    /// distributed object name return the hash of that name.
    fn partition_hash(&self) -> Option<i32> {
        self.partition_key().map(Data::partition_hash)
    }

    /// Encodes the request into a single exactly-sized frame.
    fn encode_request(&self) -> Frame {
        let mut builder = FrameBuilder::new(Self::REQUEST_TYPE, self.calculate_data_size());
        builder.set_retryable(Self::RETRYABLE);
        self.encode_payload(&mut builder);
        builder.finish()
    }

    /// Decodes a response frame.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedMessageType` if the frame is not of
    /// [`RESPONSE_TYPE`](Self::RESPONSE_TYPE).
    fn decode_response(frame: &Frame) -> Result<Self::Response> {
        expect_message_type(frame, Self::RESPONSE_TYPE)?;
        Self::decode_payload(&mut frame.reader())
    }

    /// Static description of this codec for the registry.
    fn descriptor() -> CodecDescriptor
    where
        Self: Sized,
    {
        CodecDescriptor {
            name: Self::NAME,
            request_type: Self::REQUEST_TYPE,
            response_type: Self::RESPONSE_TYPE,
            retryable: Self::RETRYABLE,
        }
    }
}

/// Fails with `UnexpectedMessageType` unless the frame has the given type.
pub fn expect_message_type(frame: &Frame, expected: u16) -> Result<()> {
    let actual = frame.message_type();
    if actual != expected {
        return Err(HazelcastError::UnexpectedMessageType { expected, actual });
    }
    Ok(())
}

/// The static part of an operation codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Operation name.
    pub name: &'static str,
    /// Request message type.
    pub request_type: u16,
    /// Expected response message type.
    pub response_type: u16,
    /// Whether the operation may be resent after a connection loss.
    pub retryable: bool,
}

/// Codec descriptors keyed by request message type.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    by_type: HashMap<u16, CodecDescriptor>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every codec shipped with this crate.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        client::register(&mut registry);
        map::register(&mut registry);
        multimap::register(&mut registry);
        queue::register(&mut registry);
        list::register(&mut registry);
        lock::register(&mut registry);
        transaction::register(&mut registry);
        transactional::register(&mut registry);
        registry
    }

    /// Registers a codec. A later registration for the same request type
    /// replaces the earlier one.
    pub fn register<C: OperationCodec>(&mut self) {
        let descriptor = C::descriptor();
        self.by_type.insert(descriptor.request_type, descriptor);
    }

    /// Looks up the codec for a request message type.
    pub fn get(&self, request_type: u16) -> Option<&CodecDescriptor> {
        self.by_type.get(&request_type)
    }

    /// Returns the retry policy for a request frame.
    ///
    /// Registered operations use their codec's policy; unknown message types
    /// fall back to the flag the frame was built with.
    pub fn is_retryable(&self, frame: &Frame) -> bool {
        self.get(frame.message_type())
            .map_or(frame.is_retryable(), |d| d.retryable)
    }

    /// Returns the operation name for a request frame, or `"unknown"`.
    pub fn name_of(&self, frame: &Frame) -> &'static str {
        self.get(frame.message_type()).map_or("unknown", |d| d.name)
    }

    /// Returns the number of registered codecs.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Returns true if no codecs are registered.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

/// Converts an error response into [`HazelcastError::Server`].
///
/// Payload: `code i32, className string, message nullable string`.
pub fn decode_error_response(frame: &Frame) -> HazelcastError {
    read_server_error(&mut frame.reader()).unwrap_or_else(|e| e)
}

fn read_server_error(reader: &mut FrameReader<'_>) -> Result<HazelcastError> {
    let code = reader.get_i32()?;
    let class_name = reader.get_str()?;
    let message = reader.get_nullable_str()?.unwrap_or_default();
    Ok(HazelcastError::Server {
        code,
        class_name,
        message,
    })
}

/// Encodes an error response. Used by members and test doubles.
pub fn encode_error_response(code: i32, class_name: &str, message: Option<&str>) -> Frame {
    let size = HEADER_SIZE
        + INT_SIZE
        + super::builder::string_size(class_name)
        + super::builder::nullable_string_size(message);
    let mut builder = FrameBuilder::new(RESPONSE_EXCEPTION, size);
    builder
        .put_i32(code)
        .put_str(class_name)
        .put_nullable_str(message);
    builder.finish()
}

/// Returns the registration id that opens every event payload.
pub fn event_registration_id(frame: &Frame) -> Result<String> {
    frame.reader().get_str()
}

pub(crate) fn decode_void(_reader: &mut FrameReader<'_>) -> Result<()> {
    Ok(())
}

pub(crate) fn decode_bool(reader: &mut FrameReader<'_>) -> Result<bool> {
    reader.get_bool()
}

pub(crate) fn decode_int(reader: &mut FrameReader<'_>) -> Result<i32> {
    reader.get_i32()
}

pub(crate) fn decode_nullable_data(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
    reader.get_nullable_data()
}

pub(crate) fn decode_data_list(reader: &mut FrameReader<'_>) -> Result<Vec<Data>> {
    reader.get_data_list()
}

/// Builders for the generic response frames, used by members and test doubles.
pub mod response {
    use super::*;
    use crate::protocol::builder::{
        data_entries_size, data_list_size, nullable_data_size, string_size,
    };

    /// An empty response.
    pub fn void() -> Frame {
        FrameBuilder::new(RESPONSE_VOID, HEADER_SIZE).finish()
    }

    /// A boolean response.
    pub fn boolean(value: bool) -> Frame {
        let mut builder = FrameBuilder::new(RESPONSE_BOOLEAN, HEADER_SIZE + BOOLEAN_SIZE);
        builder.put_bool(value);
        builder.finish()
    }

    /// An i32 response.
    pub fn integer(value: i32) -> Frame {
        let mut builder = FrameBuilder::new(RESPONSE_INTEGER, HEADER_SIZE + INT_SIZE);
        builder.put_i32(value);
        builder.finish()
    }

    /// A nullable `Data` response.
    pub fn data(value: Option<&Data>) -> Frame {
        let mut builder =
            FrameBuilder::new(RESPONSE_DATA, HEADER_SIZE + nullable_data_size(value));
        builder.put_nullable_data(value);
        builder.finish()
    }

    /// A `Data` list response.
    pub fn data_list(values: &[Data]) -> Frame {
        let mut builder =
            FrameBuilder::new(RESPONSE_LIST_DATA, HEADER_SIZE + data_list_size(values));
        builder.put_data_list(values);
        builder.finish()
    }

    /// A key/value `Data` pair list response.
    pub fn data_entries(entries: &[(Data, Data)]) -> Frame {
        let mut builder =
            FrameBuilder::new(RESPONSE_LIST_ENTRY, HEADER_SIZE + data_entries_size(entries));
        builder.put_data_entries(entries);
        builder.finish()
    }

    /// A string response.
    pub fn string(value: &str) -> Frame {
        let mut builder = FrameBuilder::new(RESPONSE_STRING, HEADER_SIZE + string_size(value));
        builder.put_str(value);
        builder.finish()
    }
}
