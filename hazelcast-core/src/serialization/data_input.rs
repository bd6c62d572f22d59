//! Big-endian input cursor used by the object deserializers.

use crate::error::{HazelcastError, Result};
use bytes::Buf;

/// Trait for reading primitive values from the object serialization format.
///
/// All multi-byte values are read in big-endian byte order.
pub trait DataInput {
    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads a UTF-16 code unit.
    fn read_char(&mut self) -> Result<u16>;

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16>;

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64>;

    /// Reads a 32-bit float.
    fn read_float(&mut self) -> Result<f32>;

    /// Reads a 64-bit float.
    fn read_double(&mut self) -> Result<f64>;

    /// Reads the specified number of raw bytes.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Reads a length-prefixed string.
    fn read_string(&mut self) -> Result<String>;

    /// Reads a string that may be null (length `-1`).
    fn read_nullable_string(&mut self) -> Result<Option<String>>;

    /// Reads an array length prefix; `-1` yields `None`.
    fn read_array_len(&mut self) -> Result<Option<usize>>;
}

/// Converts a UTF-16 code unit back into a character.
pub(crate) fn char_from_unit(unit: u16) -> Result<char> {
    char::from_u32(u32::from(unit))
        .ok_or_else(|| HazelcastError::Serialization(format!("unpaired surrogate {:#06x}", unit)))
}

/// A positioned reader over a borrowed byte slice.
///
/// The position can be moved freely, which the portable reader relies on to
/// jump straight to a field block through the offset table.
#[derive(Debug, Clone)]
pub struct ObjectDataInput<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new input over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the number of bytes remaining to be read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Returns the current position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the read position.
    ///
    /// # Errors
    ///
    /// Fails if `position` lies past the end of the input.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(HazelcastError::Serialization(format!(
                "position {} is past the end of {} bytes",
                position,
                self.data.len()
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(len)?;
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(HazelcastError::Serialization(format!(
                "insufficient data: need {} bytes, have {}",
                n,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    fn fixed<const N: usize>(&mut self) -> Result<&'a [u8]> {
        self.read_slice(N)
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_byte(&mut self) -> Result<i8> {
        Ok(self.fixed::<1>()?.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.fixed::<1>()?[0] != 0)
    }

    fn read_char(&mut self) -> Result<u16> {
        Ok(self.fixed::<2>()?.get_u16())
    }

    fn read_short(&mut self) -> Result<i16> {
        Ok(self.fixed::<2>()?.get_i16())
    }

    fn read_int(&mut self) -> Result<i32> {
        Ok(self.fixed::<4>()?.get_i32())
    }

    fn read_long(&mut self) -> Result<i64> {
        Ok(self.fixed::<8>()?.get_i64())
    }

    fn read_float(&mut self) -> Result<f32> {
        Ok(self.fixed::<4>()?.get_f32())
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(self.fixed::<8>()?.get_f64())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.read_slice(len).map(<[u8]>::to_vec)
    }

    fn read_string(&mut self) -> Result<String> {
        self.read_nullable_string()?
            .ok_or_else(|| HazelcastError::Serialization("unexpected null string".to_string()))
    }

    fn read_nullable_string(&mut self) -> Result<Option<String>> {
        let Some(len) = self.read_array_len()? else {
            return Ok(None);
        };
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| HazelcastError::Serialization(format!("invalid UTF-8 string: {}", e)))
    }

    fn read_array_len(&mut self) -> Result<Option<usize>> {
        match self.read_int()? {
            -1 => Ok(None),
            len if len < 0 => Err(HazelcastError::Serialization(format!(
                "invalid length: {}",
                len
            ))),
            len => Ok(Some(len as usize)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let data = [0x01, 0x02, 0x00, 0x41, 0x3F, 0x80, 0x00, 0x00];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_short().unwrap(), 0x0102);
        assert_eq!(input.read_char().unwrap(), 0x41);
        assert_eq!(input.read_float().unwrap(), 1.0f32);
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn test_nullable_string() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 2, b'o', b'k'];
        let mut input = ObjectDataInput::new(&data);
        assert_eq!(input.read_nullable_string().unwrap(), None);
        assert_eq!(input.read_nullable_string().unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn test_null_where_string_required() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        let mut input = ObjectDataInput::new(&data);
        assert!(input.read_string().is_err());
    }

    #[test]
    fn test_invalid_length() {
        let data = [0xFF, 0xFF, 0xFF, 0xFE];
        let mut input = ObjectDataInput::new(&data);
        assert!(input.read_array_len().is_err());
    }

    #[test]
    fn test_seek() {
        let data = [0, 0, 0, 42, 0, 0, 0, 7];
        let mut input = ObjectDataInput::new(&data);
        input.set_position(4).unwrap();
        assert_eq!(input.read_int().unwrap(), 7);
        input.set_position(0).unwrap();
        assert_eq!(input.read_int().unwrap(), 42);
        assert!(input.set_position(9).is_err());
    }

    #[test]
    fn test_truncated() {
        let data = [0x01, 0x02, 0x03];
        let mut input = ObjectDataInput::new(&data);
        assert!(input.read_int().is_err());
        assert_eq!(input.position(), 0);
    }
}
