//! Transactional map, list and queue codecs.
//!
//! None of these are retryable: a resend could apply a change twice.

use super::*;
use crate::protocol::builder::{data_size, string_size};

fn txn_header_size(name: &str, txn_id: &str) -> usize {
    HEADER_SIZE + string_size(name) + string_size(txn_id) + LONG_SIZE
}

/// Reads a key within a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalMapGetCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized key.
    pub key: &'a Data,
}

impl OperationCodec for TransactionalMapGetCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "TransactionalMap.get";
    const REQUEST_TYPE: u16 = TXN_MAP_GET;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + data_size(self.key)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.key);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

/// Writes a key within a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalMapPutCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized key.
    pub key: &'a Data,
    /// Serialized value.
    pub value: &'a Data,
    /// Time to live in milliseconds.
    pub ttl_millis: i64,
}

impl OperationCodec for TransactionalMapPutCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "TransactionalMap.put";
    const REQUEST_TYPE: u16 = TXN_MAP_PUT;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id)
            + data_size(self.key)
            + data_size(self.value)
            + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.key)
            .put_data(self.value)
            .put_i64(self.ttl_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

/// Removes a key within a transaction, returning the removed value.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalMapRemoveCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized key.
    pub key: &'a Data,
}

impl OperationCodec for TransactionalMapRemoveCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "TransactionalMap.remove";
    const REQUEST_TYPE: u16 = TXN_MAP_REMOVE;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + data_size(self.key)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.key);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

/// Appends an item to a list within a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalListAddCodec<'a> {
    /// List name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized item.
    pub item: &'a Data,
}

impl OperationCodec for TransactionalListAddCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "TransactionalList.add";
    const REQUEST_TYPE: u16 = TXN_LIST_ADD;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + data_size(self.item)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.item);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Removes an item from a list within a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalListRemoveCodec<'a> {
    /// List name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized item.
    pub item: &'a Data,
}

impl OperationCodec for TransactionalListRemoveCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "TransactionalList.remove";
    const REQUEST_TYPE: u16 = TXN_LIST_REMOVE;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + data_size(self.item)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.item);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Returns the list size as seen by the transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalListSizeCodec<'a> {
    /// List name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for TransactionalListSizeCodec<'_> {
    type Response = i32;

    const NAME: &'static str = "TransactionalList.size";
    const REQUEST_TYPE: u16 = TXN_LIST_SIZE;
    const RESPONSE_TYPE: u16 = RESPONSE_INTEGER;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<i32> {
        decode_int(reader)
    }
}

/// Offers an item to a queue within a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalQueueOfferCodec<'a> {
    /// Queue name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Serialized item.
    pub item: &'a Data,
    /// Member-side wait for capacity.
    pub timeout_millis: i64,
}

impl OperationCodec for TransactionalQueueOfferCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "TransactionalQueue.offer";
    const REQUEST_TYPE: u16 = TXN_QUEUE_OFFER;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + data_size(self.item) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_data(self.item)
            .put_i64(self.timeout_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Polls a queue within a transaction, waiting up to `timeout_millis`.
#[derive(Debug, Clone, Copy)]
pub struct TransactionalQueuePollCodec<'a> {
    /// Queue name.
    pub name: &'a str,
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Member-side wait for an item.
    pub timeout_millis: i64,
}

impl OperationCodec for TransactionalQueuePollCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "TransactionalQueue.poll";
    const REQUEST_TYPE: u16 = TXN_QUEUE_POLL;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        txn_header_size(self.name, self.txn_id) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.txn_id)
            .put_i64(self.thread_id)
            .put_i64(self.timeout_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<TransactionalMapGetCodec<'static>>();
    registry.register::<TransactionalMapPutCodec<'static>>();
    registry.register::<TransactionalMapRemoveCodec<'static>>();
    registry.register::<TransactionalListAddCodec<'static>>();
    registry.register::<TransactionalListRemoveCodec<'static>>();
    registry.register::<TransactionalListSizeCodec<'static>>();
    registry.register::<TransactionalQueueOfferCodec<'static>>();
    registry.register::<TransactionalQueuePollCodec<'static>>();
}
