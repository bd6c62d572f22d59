//! Single-allocation request encoding.

use bytes::{BufMut, BytesMut};

use super::constants::*;
use super::frame::Frame;
use crate::serialization::Data;

/// Wire size of a length-prefixed UTF-8 string.
pub fn string_size(value: &str) -> usize {
    INT_SIZE + value.len()
}

/// Wire size of a nullable string.
pub fn nullable_string_size(value: Option<&str>) -> usize {
    BOOLEAN_SIZE + value.map_or(0, string_size)
}

/// Wire size of a length-prefixed `Data` blob.
pub fn data_size(value: &Data) -> usize {
    INT_SIZE + value.len()
}

/// Wire size of a nullable `Data` blob.
pub fn nullable_data_size(value: Option<&Data>) -> usize {
    BOOLEAN_SIZE + value.map_or(0, data_size)
}

/// Wire size of a counted list of `Data` blobs.
pub fn data_list_size(values: &[Data]) -> usize {
    INT_SIZE + values.iter().map(data_size).sum::<usize>()
}

/// Wire size of a counted list of key/value `Data` pairs.
pub fn data_entries_size(entries: &[(Data, Data)]) -> usize {
    INT_SIZE
        + entries
            .iter()
            .map(|(key, value)| data_size(key) + data_size(value))
            .sum::<usize>()
}

/// Writes a request frame into a buffer allocated once with the exact size
/// computed by the operation codec.
///
/// `data_size` includes the header, mirroring how codecs compute their size
/// starting from [`HEADER_SIZE`].
#[derive(Debug)]
pub struct FrameBuilder {
    buffer: BytesMut,
    expected_size: usize,
    retryable: bool,
}

impl FrameBuilder {
    /// Allocates the frame and writes its header.
    pub fn new(message_type: u16, data_size: usize) -> Self {
        let mut buffer = BytesMut::with_capacity(data_size);
        buffer.put_i32_le(0);
        buffer.put_u8(PROTOCOL_VERSION);
        buffer.put_u8(BEGIN_END_FLAGS);
        buffer.put_u16_le(message_type);
        buffer.put_i64_le(0);
        buffer.put_i32_le(PARTITION_ID_ANY);
        buffer.put_u16_le(HEADER_SIZE as u16);
        Self {
            buffer,
            expected_size: data_size,
            retryable: false,
        }
    }

    /// Marks the resulting frame as safe to resend after a connection loss.
    pub fn set_retryable(&mut self, retryable: bool) -> &mut Self {
        self.retryable = retryable;
        self
    }

    /// Sets the header partition id.
    pub fn set_partition_id(&mut self, partition_id: i32) -> &mut Self {
        (&mut self.buffer[PARTITION_ID_OFFSET..PARTITION_ID_OFFSET + INT_SIZE])
            .put_i32_le(partition_id);
        self
    }

    /// Writes a bool.
    pub fn put_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.put_u8(u8::from(value));
        self
    }

    /// Writes a byte.
    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.put_u8(value);
        self
    }

    /// Writes an i32.
    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.put_i32_le(value);
        self
    }

    /// Writes an i64.
    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buffer.put_i64_le(value);
        self
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.buffer.put_i32_le(value.len() as i32);
        self.buffer.put_slice(value.as_bytes());
        self
    }

    /// Writes a nullable string.
    pub fn put_nullable_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(value) => self.put_bool(false).put_str(value),
            None => self.put_bool(true),
        }
    }

    /// Writes a length-prefixed `Data` blob.
    pub fn put_data(&mut self, value: &Data) -> &mut Self {
        self.buffer.put_i32_le(value.len() as i32);
        self.buffer.put_slice(value.as_bytes());
        self
    }

    /// Writes a nullable `Data` blob.
    pub fn put_nullable_data(&mut self, value: Option<&Data>) -> &mut Self {
        match value {
            Some(value) => self.put_bool(false).put_data(value),
            None => self.put_bool(true),
        }
    }

    /// Writes a counted list of `Data` blobs.
    pub fn put_data_list(&mut self, values: &[Data]) -> &mut Self {
        self.buffer.put_i32_le(values.len() as i32);
        for value in values {
            self.put_data(value);
        }
        self
    }

    /// Writes a counted list of key/value `Data` pairs.
    pub fn put_data_entries(&mut self, entries: &[(Data, Data)]) -> &mut Self {
        self.buffer.put_i32_le(entries.len() as i32);
        for (key, value) in entries {
            self.put_data(key).put_data(value);
        }
        self
    }

    /// Writes the frame length and returns the finished frame.
    pub fn finish(mut self) -> Frame {
        debug_assert_eq!(
            self.buffer.len(),
            self.expected_size,
            "calculated frame size does not match bytes written"
        );
        let length = self.buffer.len() as i32;
        (&mut self.buffer[FRAME_LENGTH_OFFSET..FRAME_LENGTH_OFFSET + INT_SIZE]).put_i32_le(length);
        Frame::from_parts(self.buffer, self.retryable)
    }
}
