//! Distributed list codecs.

use super::*;
use crate::protocol::builder::string_size;

/// Removes the item at `index`, returning it.
///
/// Not retryable: a resend after a lost response removes the next item.
#[derive(Debug, Clone, Copy)]
pub struct ListRemoveAtCodec<'a> {
    /// List name.
    pub name: &'a str,
    /// Position of the item to remove.
    pub index: i32,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for ListRemoveAtCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "List.removeAt";
    const REQUEST_TYPE: u16 = LIST_REMOVE_AT;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + INT_SIZE + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_i32(self.index)
            .put_i64(self.thread_id);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<ListRemoveAtCodec<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_at_layout_and_response() {
        let codec = ListRemoveAtCodec {
            name: "tasks",
            index: 2,
            thread_id: 11,
        };
        let frame = codec.encode_request();
        assert_eq!(frame.message_type(), LIST_REMOVE_AT);
        assert_eq!(frame.len(), codec.calculate_data_size());
        assert!(!frame.is_retryable());
        assert_eq!(codec.partition_hash(), Some(name_partition_hash("tasks")));

        let mut reader = frame.reader();
        assert_eq!(reader.get_str().unwrap(), "tasks");
        assert_eq!(reader.get_i32().unwrap(), 2);
        assert_eq!(reader.get_i64().unwrap(), 11);

        let item = Data::new(-11, 0, b"third");
        let removed = ListRemoveAtCodec::decode_response(&response::data(Some(&item)));
        assert_eq!(removed.unwrap(), Some(item));
        assert_eq!(ListRemoveAtCodec::decode_response(&response::data(None)).unwrap(), None);
    }
}
