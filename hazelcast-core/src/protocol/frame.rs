//! Frame type for the Hazelcast client binary protocol.

use bytes::{Buf, BufMut, BytesMut};

use super::constants::*;
use super::reader::FrameReader;
use crate::error::{HazelcastError, Result};

/// One complete wire message: a 22-byte header followed by the payload.
///
/// The whole message lives in one contiguous buffer so that encoding needs a
/// single allocation and decoding needs none. `retryable` is a client-local
/// attribute set by the operation codec; it never reaches the wire.
#[derive(Debug, Clone)]
pub struct Frame {
    buffer: BytesMut,
    retryable: bool,
}

impl Frame {
    pub(crate) fn from_parts(buffer: BytesMut, retryable: bool) -> Self {
        Self { buffer, retryable }
    }

    /// Decodes one complete frame from exactly the bytes it occupies.
    ///
    /// # Errors
    ///
    /// - `MalformedFrame` if the declared length differs from the bytes
    ///   available, the data offset points outside the frame, undefined
    ///   flag bits are set or the message type is not a known one.
    /// - `VersionMismatch` if the version byte is not [`PROTOCOL_VERSION`].
    pub fn decode(buffer: BytesMut) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(HazelcastError::MalformedFrame(format!(
                "{} bytes is shorter than the {}-byte header",
                buffer.len(),
                HEADER_SIZE
            )));
        }

        let declared = (&buffer[FRAME_LENGTH_OFFSET..]).get_i32_le();
        if declared < 0 || declared as usize != buffer.len() {
            return Err(HazelcastError::MalformedFrame(format!(
                "declared frame length {} does not match {} available bytes",
                declared,
                buffer.len()
            )));
        }

        let version = buffer[VERSION_OFFSET];
        if version != PROTOCOL_VERSION {
            return Err(HazelcastError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: version,
            });
        }

        let flags = buffer[FLAGS_OFFSET];
        if flags & !KNOWN_FLAGS != 0 {
            return Err(HazelcastError::MalformedFrame(format!(
                "undefined flag bits {:#04x}",
                flags & !KNOWN_FLAGS
            )));
        }

        let message_type = (&buffer[TYPE_OFFSET..]).get_u16_le();
        if !is_known_message_type(message_type) {
            return Err(HazelcastError::MalformedFrame(format!(
                "unknown message type {:#06x}",
                message_type
            )));
        }

        let data_offset = (&buffer[DATA_OFFSET_OFFSET..]).get_u16_le() as usize;
        if data_offset < HEADER_SIZE || data_offset > buffer.len() {
            return Err(HazelcastError::MalformedFrame(format!(
                "data offset {} outside frame of {} bytes",
                data_offset,
                buffer.len()
            )));
        }

        Ok(Self {
            buffer,
            retryable: false,
        })
    }

    /// Decodes a frame from a byte slice, copying it.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::decode(BytesMut::from(bytes))
    }

    /// Returns the declared frame length (header plus payload).
    pub fn frame_length(&self) -> usize {
        (&self.buffer[FRAME_LENGTH_OFFSET..]).get_i32_le() as usize
    }

    /// Returns the protocol version byte.
    pub fn version(&self) -> u8 {
        self.buffer[VERSION_OFFSET]
    }

    /// Returns the raw flag bits.
    pub fn flags(&self) -> u8 {
        self.buffer[FLAGS_OFFSET]
    }

    /// Returns the message type.
    pub fn message_type(&self) -> u16 {
        (&self.buffer[TYPE_OFFSET..]).get_u16_le()
    }

    /// Returns the correlation id.
    pub fn correlation_id(&self) -> i64 {
        (&self.buffer[CORRELATION_ID_OFFSET..]).get_i64_le()
    }

    /// Returns the partition id, or [`PARTITION_ID_ANY`].
    pub fn partition_id(&self) -> i32 {
        (&self.buffer[PARTITION_ID_OFFSET..]).get_i32_le()
    }

    /// Returns the offset at which the payload starts.
    pub fn data_offset(&self) -> usize {
        (&self.buffer[DATA_OFFSET_OFFSET..]).get_u16_le() as usize
    }

    /// Returns true if this frame carries an event.
    pub fn is_event(&self) -> bool {
        self.flags() & EVENT_FLAG != 0
    }

    /// Returns true if the BEGIN flag is set.
    pub fn is_begin(&self) -> bool {
        self.flags() & BEGIN_FLAG != 0
    }

    /// Returns true if the END flag is set.
    pub fn is_end(&self) -> bool {
        self.flags() & END_FLAG != 0
    }

    /// Returns whether the operation may be resent after a connection loss.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Marks whether the operation may be resent after a connection loss.
    pub fn set_retryable(&mut self, retryable: bool) {
        self.retryable = retryable;
    }

    /// Overwrites the correlation id in place.
    pub fn set_correlation_id(&mut self, correlation_id: i64) {
        (&mut self.buffer[CORRELATION_ID_OFFSET..CORRELATION_ID_OFFSET + LONG_SIZE])
            .put_i64_le(correlation_id);
    }

    /// Overwrites the partition id in place.
    pub fn set_partition_id(&mut self, partition_id: i32) {
        (&mut self.buffer[PARTITION_ID_OFFSET..PARTITION_ID_OFFSET + INT_SIZE])
            .put_i32_le(partition_id);
    }

    /// Sets additional flag bits.
    pub fn add_flags(&mut self, flags: u8) {
        self.buffer[FLAGS_OFFSET] |= flags;
    }

    /// Returns the payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.data_offset()..]
    }

    /// Returns a reader positioned at the start of the payload.
    pub fn reader(&self) -> FrameReader<'_> {
        FrameReader::new(self.payload())
    }

    /// Returns the complete wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the total size on the wire.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the frame has no payload.
    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }
}
