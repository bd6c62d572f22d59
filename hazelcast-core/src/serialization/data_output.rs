//! Big-endian output buffer used by the object serializers.

use crate::error::{HazelcastError, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Length written in place of an array or string that is null.
pub(crate) const NULL_LENGTH: i32 = -1;

/// Trait for writing primitive values in the object serialization format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a UTF-16 code unit.
    fn write_char(&mut self, v: u16) -> Result<()>;

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes a 32-bit float.
    fn write_float(&mut self, v: f32) -> Result<()>;

    /// Writes a 64-bit float.
    fn write_double(&mut self, v: f64) -> Result<()>;

    /// Writes raw bytes without length prefix.
    fn write_bytes(&mut self, v: &[u8]) -> Result<()>;

    /// Writes a length-prefixed UTF-8 string.
    fn write_string(&mut self, v: &str) -> Result<()>;

    /// Writes a nullable string; `None` is encoded as length `-1`.
    fn write_nullable_string(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => self.write_string(s),
            None => self.write_int(NULL_LENGTH),
        }
    }

    /// Writes an array length prefix; `None` is encoded as `-1`.
    fn write_array_len(&mut self, len: Option<usize>) -> Result<()> {
        match len {
            Some(len) => self.write_int(checked_len(len)?),
            None => self.write_int(NULL_LENGTH),
        }
    }
}

/// Converts a character to the single UTF-16 code unit it is written as.
pub(crate) fn utf16_unit(c: char) -> Result<u16> {
    u16::try_from(u32::from(c)).map_err(|_| {
        HazelcastError::Serialization(format!(
            "character {:?} is outside the basic multilingual plane",
            c
        ))
    })
}

fn checked_len(len: usize) -> Result<i32> {
    i32::try_from(len)
        .map_err(|_| HazelcastError::Serialization(format!("length {} exceeds i32::MAX", len)))
}

/// A growable buffer implementing `DataOutput`.
///
/// Besides appending, it supports patching an i32 at an earlier position,
/// which the portable writer uses to fill its offset table after the field
/// blocks have been placed.
#[derive(Debug, Default)]
pub struct ObjectDataOutput {
    buffer: BytesMut,
}

impl ObjectDataOutput {
    /// Creates a new, empty output.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new output with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Returns the current write position.
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    /// Overwrites the i32 at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the four bytes at `position` have not been written yet.
    pub fn write_int_at(&mut self, position: usize, v: i32) -> Result<()> {
        let end = position + 4;
        if end > self.buffer.len() {
            return Err(HazelcastError::Serialization(format!(
                "cannot patch i32 at {}: only {} bytes written",
                position,
                self.buffer.len()
            )));
        }
        self.buffer[position..end].copy_from_slice(&v.to_be_bytes());
        Ok(())
    }

    /// Appends `count` zero bytes and returns the position of the first one.
    pub fn reserve_zeroed(&mut self, count: usize) -> usize {
        let position = self.buffer.len();
        self.buffer.put_bytes(0, count);
        position
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes without copying.
    pub fn freeze(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl DataOutput for ObjectDataOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.buffer.put_i8(v);
        Ok(())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.buffer.put_u8(u8::from(v));
        Ok(())
    }

    fn write_char(&mut self, v: u16) -> Result<()> {
        self.buffer.put_u16(v);
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.buffer.put_i16(v);
        Ok(())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.buffer.put_i32(v);
        Ok(())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.buffer.put_i64(v);
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        self.buffer.put_f32(v);
        Ok(())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.buffer.put_f64(v);
        Ok(())
    }

    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.buffer.put_slice(v);
        Ok(())
    }

    fn write_string(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        self.write_int(checked_len(bytes.len())?)?;
        self.write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut output = ObjectDataOutput::new();
        output.write_short(0x0102).unwrap();
        output.write_int(0x03040506).unwrap();
        output.write_char(0x0041).unwrap();
        assert_eq!(output.as_bytes(), &[1, 2, 3, 4, 5, 6, 0, 0x41]);
    }

    #[test]
    fn test_write_string() {
        let mut output = ObjectDataOutput::new();
        output.write_string("ali").unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 3, b'a', b'l', b'i']);
    }

    #[test]
    fn test_null_markers() {
        let mut output = ObjectDataOutput::new();
        output.write_nullable_string(None).unwrap();
        output.write_array_len(None).unwrap();
        output.write_array_len(Some(2)).unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 2]
        );
    }

    #[test]
    fn test_patch_reserved_slot() {
        let mut output = ObjectDataOutput::new();
        let slot = output.reserve_zeroed(4);
        output.write_byte(7).unwrap();
        output.write_int_at(slot, 5).unwrap();
        assert_eq!(output.as_bytes(), &[0, 0, 0, 5, 7]);
        assert!(output.write_int_at(3, 1).is_err());
    }

    #[test]
    fn test_freeze() {
        let mut output = ObjectDataOutput::default();
        assert!(output.is_empty());
        output.write_bool(true).unwrap();
        let bytes = output.freeze();
        assert_eq!(&bytes[..], &[1]);
    }
}
