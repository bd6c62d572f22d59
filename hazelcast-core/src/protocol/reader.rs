//! Bounds-checked payload decoding.

use bytes::Buf;

use super::constants::*;
use crate::error::{HazelcastError, Result};
use crate::serialization::Data;

/// Sequential reader over a frame payload.
///
/// Every read checks the remaining length and fails with `MalformedFrame`
/// instead of panicking on truncated input.
#[derive(Debug)]
pub struct FrameReader<'a> {
    payload: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over the given payload.
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            position: 0,
        }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.position
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(HazelcastError::MalformedFrame(format!(
                "payload truncated: need {} bytes at offset {}, have {}",
                len,
                self.position,
                self.remaining()
            )));
        }
        let slice = &self.payload[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn take_len(&mut self) -> Result<usize> {
        let len = self.get_i32()?;
        usize::try_from(len)
            .map_err(|_| HazelcastError::MalformedFrame(format!("negative length {}", len)))
    }

    /// Reads a bool.
    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.take(BOOLEAN_SIZE)?[0] != 0)
    }

    /// Reads a byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(BYTE_SIZE)?[0])
    }

    /// Reads an i32.
    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(self.take(INT_SIZE)?.get_i32_le())
    }

    /// Reads an i64.
    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(self.take(LONG_SIZE)?.get_i64_le())
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_str(&mut self) -> Result<String> {
        let len = self.take_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| HazelcastError::MalformedFrame(format!("invalid UTF-8 string: {}", e)))
    }

    /// Reads a nullable string.
    pub fn get_nullable_str(&mut self) -> Result<Option<String>> {
        if self.get_bool()? {
            Ok(None)
        } else {
            self.get_str().map(Some)
        }
    }

    /// Reads a length-prefixed `Data` blob.
    pub fn get_data(&mut self) -> Result<Data> {
        let len = self.take_len()?;
        let bytes = self.take(len)?;
        Data::from_bytes(bytes.to_vec())
            .map_err(|e| HazelcastError::MalformedFrame(format!("invalid data blob: {}", e)))
    }

    /// Reads a nullable `Data` blob.
    pub fn get_nullable_data(&mut self) -> Result<Option<Data>> {
        if self.get_bool()? {
            Ok(None)
        } else {
            self.get_data().map(Some)
        }
    }

    /// Reads a counted list of `Data` blobs.
    pub fn get_data_list(&mut self) -> Result<Vec<Data>> {
        let count = self.take_len()?;
        let mut values = Vec::with_capacity(count.min(self.remaining() / INT_SIZE));
        for _ in 0..count {
            values.push(self.get_data()?);
        }
        Ok(values)
    }

    /// Reads a counted list of key/value `Data` pairs.
    pub fn get_data_entries(&mut self) -> Result<Vec<(Data, Data)>> {
        let count = self.take_len()?;
        let mut entries = Vec::with_capacity(count.min(self.remaining() / (2 * INT_SIZE)));
        for _ in 0..count {
            entries.push((self.get_data()?, self.get_data()?));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::builder::{nullable_string_size, string_size, FrameBuilder};

    #[test]
    fn test_reads_back_builder_output() {
        let size = HEADER_SIZE
            + string_size("name")
            + nullable_string_size(None)
            + LONG_SIZE
            + BOOLEAN_SIZE;
        let mut builder = FrameBuilder::new(MAP_GET, size);
        builder
            .put_str("name")
            .put_nullable_str(None)
            .put_i64(-5)
            .put_bool(true);
        let frame = builder.finish();

        let mut reader = frame.reader();
        assert_eq!(reader.get_str().unwrap(), "name");
        assert_eq!(reader.get_nullable_str().unwrap(), None);
        assert_eq!(reader.get_i64().unwrap(), -5);
        assert!(reader.get_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let payload = 10i32.to_le_bytes();
        let mut reader = FrameReader::new(&payload);
        let err = reader.get_str().unwrap_err();
        assert!(matches!(err, HazelcastError::MalformedFrame(_)));
    }

    #[test]
    fn test_negative_length_is_malformed() {
        let payload = (-3i32).to_le_bytes();
        let mut reader = FrameReader::new(&payload);
        assert!(matches!(
            reader.get_data().unwrap_err(),
            HazelcastError::MalformedFrame(_)
        ));
    }
}
