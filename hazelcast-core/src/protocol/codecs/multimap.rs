//! MultiMap codecs.

use super::*;
use crate::protocol::builder::{data_size, string_size};

/// Adds a value to the collection stored under a key.
#[derive(Debug, Clone, Copy)]
pub struct MultiMapPutCodec<'a> {
    /// MultiMap name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Serialized value.
    pub value: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MultiMapPutCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "MultiMap.put";
    const REQUEST_TYPE: u16 = MULTIMAP_PUT;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE
            + string_size(self.name)
            + data_size(self.key)
            + data_size(self.value)
            + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_data(self.value)
            .put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Returns every value stored under a key.
#[derive(Debug, Clone, Copy)]
pub struct MultiMapGetCodec<'a> {
    /// MultiMap name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MultiMapGetCodec<'_> {
    type Response = Vec<Data>;

    const NAME: &'static str = "MultiMap.get";
    const REQUEST_TYPE: u16 = MULTIMAP_GET;
    const RESPONSE_TYPE: u16 = RESPONSE_LIST_DATA;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.key) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<Data>> {
        decode_data_list(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Removes every value stored under a key and returns them.
#[derive(Debug, Clone, Copy)]
pub struct MultiMapRemoveCodec<'a> {
    /// MultiMap name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MultiMapRemoveCodec<'_> {
    type Response = Vec<Data>;

    const NAME: &'static str = "MultiMap.remove";
    const REQUEST_TYPE: u16 = MULTIMAP_REMOVE;
    const RESPONSE_TYPE: u16 = RESPONSE_LIST_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.key) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<Data>> {
        decode_data_list(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Returns the number of values stored under a key.
#[derive(Debug, Clone, Copy)]
pub struct MultiMapValueCountCodec<'a> {
    /// MultiMap name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MultiMapValueCountCodec<'_> {
    type Response = i32;

    const NAME: &'static str = "MultiMap.valueCount";
    const REQUEST_TYPE: u16 = MULTIMAP_VALUE_COUNT;
    const RESPONSE_TYPE: u16 = RESPONSE_INTEGER;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.key) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<i32> {
        decode_int(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<MultiMapPutCodec<'static>>();
    registry.register::<MultiMapGetCodec<'static>>();
    registry.register::<MultiMapRemoveCodec<'static>>();
    registry.register::<MultiMapValueCountCodec<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_decodes_value_list() {
        let a = Data::from_bytes(vec![0, 0, 0, 0, 0xff, 0xff, 0xff, 0xfc, 1]).unwrap();
        let b = Data::from_bytes(vec![0, 0, 0, 0, 0xff, 0xff, 0xff, 0xfc, 0]).unwrap();
        let frame = response::data_list(&[a.clone(), b.clone()]);
        assert_eq!(MultiMapGetCodec::decode_response(&frame).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_put_is_not_retryable() {
        let key = Data::from_bytes(vec![0u8; 8]).unwrap();
        let frame = MultiMapPutCodec {
            name: "mm",
            key: &key,
            value: &key,
            thread_id: 1,
        }
        .encode_request();
        assert!(!frame.is_retryable());
        assert_eq!(frame.message_type(), MULTIMAP_PUT);
    }
}
