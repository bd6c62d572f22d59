//! Distributed queue codecs.

use super::*;
use crate::protocol::builder::{data_size, string_size};

/// Inserts an item, waiting up to `timeout_millis` for capacity.
#[derive(Debug, Clone, Copy)]
pub struct QueueOfferCodec<'a> {
    /// Queue name.
    pub name: &'a str,
    /// Serialized item.
    pub value: &'a Data,
    /// Member-side wait for free capacity.
    pub timeout_millis: i64,
}

impl OperationCodec for QueueOfferCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "Queue.offer";
    const REQUEST_TYPE: u16 = QUEUE_OFFER;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.value) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.value)
            .put_i64(self.timeout_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Removes the head item, waiting up to `timeout_millis` for one to arrive.
#[derive(Debug, Clone, Copy)]
pub struct QueuePollCodec<'a> {
    /// Queue name.
    pub name: &'a str,
    /// Member-side wait for an item.
    pub timeout_millis: i64,
}

impl OperationCodec for QueuePollCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "Queue.poll";
    const REQUEST_TYPE: u16 = QUEUE_POLL;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name).put_i64(self.timeout_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

/// Returns the number of queued items.
#[derive(Debug, Clone, Copy)]
pub struct QueueSizeCodec<'a> {
    /// Queue name.
    pub name: &'a str,
}

impl OperationCodec for QueueSizeCodec<'_> {
    type Response = i32;

    const NAME: &'static str = "Queue.size";
    const REQUEST_TYPE: u16 = QUEUE_SIZE;
    const RESPONSE_TYPE: u16 = RESPONSE_INTEGER;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<i32> {
        decode_int(reader)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<QueueOfferCodec<'static>>();
    registry.register::<QueuePollCodec<'static>>();
    registry.register::<QueueSizeCodec<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_carries_timeout_argument() {
        let frame = QueuePollCodec {
            name: "jobs",
            timeout_millis: 2_000,
        }
        .encode_request();
        let mut reader = frame.reader();
        assert_eq!(reader.get_str().unwrap(), "jobs");
        assert_eq!(reader.get_i64().unwrap(), 2_000);
    }

    #[test]
    fn test_routes_by_queue_name() {
        let poll = QueuePollCodec {
            name: "jobs",
            timeout_millis: 0,
        };
        assert_eq!(poll.partition_hash(), Some(name_partition_hash("jobs")));
        assert_eq!(QueueSizeCodec { name: "jobs" }.partition_hash(), poll.partition_hash());
    }

    #[test]
    fn test_size_response() {
        assert_eq!(QueueSizeCodec::decode_response(&response::integer(4)).unwrap(), 4);
    }
}
