//! Distributed map codecs and the entry event decoder.

use super::*;
use crate::protocol::builder::{data_size, nullable_data_size, string_size};

/// Associates a value with a key, returning the previous value.
#[derive(Debug, Clone, Copy)]
pub struct MapPutCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Serialized value.
    pub value: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Time to live in milliseconds, `-1` for the map default.
    pub ttl_millis: i64,
}

impl OperationCodec for MapPutCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "Map.put";
    const REQUEST_TYPE: u16 = MAP_PUT;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE
            + string_size(self.name)
            + data_size(self.key)
            + data_size(self.value)
            + 2 * LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_data(self.value)
            .put_i64(self.thread_id)
            .put_i64(self.ttl_millis);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Reads the value for a key.
#[derive(Debug, Clone, Copy)]
pub struct MapGetCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MapGetCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "Map.get";
    const REQUEST_TYPE: u16 = MAP_GET;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
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

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Removes the mapping for a key, returning the removed value.
#[derive(Debug, Clone, Copy)]
pub struct MapRemoveCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MapRemoveCodec<'_> {
    type Response = Option<Data>;

    const NAME: &'static str = "Map.remove";
    const REQUEST_TYPE: u16 = MAP_REMOVE;
    const RESPONSE_TYPE: u16 = RESPONSE_DATA;
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

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<Data>> {
        decode_nullable_data(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Returns whether the map contains a key.
#[derive(Debug, Clone, Copy)]
pub struct MapContainsKeyCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MapContainsKeyCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "Map.containsKey";
    const REQUEST_TYPE: u16 = MAP_CONTAINS_KEY;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
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

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Returns the number of entries in the map.
#[derive(Debug, Clone, Copy)]
pub struct MapSizeCodec<'a> {
    /// Map name.
    pub name: &'a str,
}

impl OperationCodec for MapSizeCodec<'_> {
    type Response = i32;

    const NAME: &'static str = "Map.size";
    const REQUEST_TYPE: u16 = MAP_SIZE;
    const RESPONSE_TYPE: u16 = RESPONSE_INTEGER;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<i32> {
        decode_int(reader)
    }
}

/// Removes every entry of the map.
#[derive(Debug, Clone, Copy)]
pub struct MapClearCodec<'a> {
    /// Map name.
    pub name: &'a str,
}

impl OperationCodec for MapClearCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Map.clear";
    const REQUEST_TYPE: u16 = MAP_CLEAR;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Adds an index on an attribute of the map values.
///
/// Adding an existing index is a no-op on the member, so the operation is
/// safe to resend.
#[derive(Debug, Clone, Copy)]
pub struct MapAddIndexCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Attribute path to index.
    pub attribute: &'a str,
    /// Sorted index when true, hash index otherwise.
    pub ordered: bool,
}

impl OperationCodec for MapAddIndexCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Map.addIndex";
    const REQUEST_TYPE: u16 = MAP_ADD_INDEX;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + string_size(self.attribute) + BOOLEAN_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.attribute)
            .put_bool(self.ordered);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Acquires the lock for a key.
#[derive(Debug, Clone, Copy)]
pub struct MapLockCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Lease time in milliseconds, `-1` for no lease.
    pub ttl_millis: i64,
}

impl OperationCodec for MapLockCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Map.lock";
    const REQUEST_TYPE: u16 = MAP_LOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.key) + 2 * LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_data(self.key)
            .put_i64(self.thread_id)
            .put_i64(self.ttl_millis);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Releases the lock for a key regardless of its owner.
#[derive(Debug, Clone, Copy)]
pub struct MapForceUnlockCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
}

impl OperationCodec for MapForceUnlockCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Map.forceUnlock";
    const REQUEST_TYPE: u16 = MAP_FORCE_UNLOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + data_size(self.key)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name).put_data(self.key);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Read-only view of a map entry with its statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    /// Serialized key.
    pub key: Data,
    /// Serialized value.
    pub value: Data,
    /// Memory cost of the entry in bytes.
    pub cost: i64,
    /// Creation time, epoch milliseconds.
    pub creation_time: i64,
    /// Expiration time if a ttl applies, epoch milliseconds.
    pub expiration_time: i64,
    /// Number of hits.
    pub hits: i64,
    /// Last access time, epoch milliseconds.
    pub last_access_time: i64,
    /// Last time the entry was written to the map store.
    pub last_stored_time: i64,
    /// Last update time, epoch milliseconds.
    pub last_update_time: i64,
    /// Entry version.
    pub version: i64,
}

const ENTRY_VIEW_STATISTICS: usize = 8;

impl EntryView {
    fn wire_size(&self) -> usize {
        data_size(&self.key) + data_size(&self.value) + ENTRY_VIEW_STATISTICS * LONG_SIZE
    }

    fn get(reader: &mut FrameReader<'_>) -> Result<Self> {
        Ok(Self {
            key: reader.get_data()?,
            value: reader.get_data()?,
            cost: reader.get_i64()?,
            creation_time: reader.get_i64()?,
            expiration_time: reader.get_i64()?,
            hits: reader.get_i64()?,
            last_access_time: reader.get_i64()?,
            last_stored_time: reader.get_i64()?,
            last_update_time: reader.get_i64()?,
            version: reader.get_i64()?,
        })
    }

    /// Encodes a nullable entry view response. Used by members and test
    /// doubles.
    pub fn encode_response(view: Option<&EntryView>) -> Frame {
        let size = HEADER_SIZE + BOOLEAN_SIZE + view.map_or(0, EntryView::wire_size);
        let mut builder = FrameBuilder::new(RESPONSE_ENTRY_VIEW, size);
        match view {
            None => {
                builder.put_bool(true);
            }
            Some(view) => {
                builder
                    .put_bool(false)
                    .put_data(&view.key)
                    .put_data(&view.value)
                    .put_i64(view.cost)
                    .put_i64(view.creation_time)
                    .put_i64(view.expiration_time)
                    .put_i64(view.hits)
                    .put_i64(view.last_access_time)
                    .put_i64(view.last_stored_time)
                    .put_i64(view.last_update_time)
                    .put_i64(view.version);
            }
        }
        builder.finish()
    }
}

/// Returns the entry view for a key, or `None` if the key is absent.
#[derive(Debug, Clone, Copy)]
pub struct MapGetEntryViewCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Serialized key.
    pub key: &'a Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for MapGetEntryViewCodec<'_> {
    type Response = Option<EntryView>;

    const NAME: &'static str = "Map.getEntryView";
    const REQUEST_TYPE: u16 = MAP_GET_ENTRY_VIEW;
    const RESPONSE_TYPE: u16 = RESPONSE_ENTRY_VIEW;
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

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Option<EntryView>> {
        if reader.get_bool()? {
            return Ok(None);
        }
        EntryView::get(reader).map(Some)
    }

    fn partition_key(&self) -> Option<&Data> {
        Some(self.key)
    }
}

/// Returns every key of the map.
#[derive(Debug, Clone, Copy)]
pub struct MapKeySetCodec<'a> {
    /// Map name.
    pub name: &'a str,
}

impl OperationCodec for MapKeySetCodec<'_> {
    type Response = Vec<Data>;

    const NAME: &'static str = "Map.keySet";
    const REQUEST_TYPE: u16 = MAP_KEY_SET;
    const RESPONSE_TYPE: u16 = RESPONSE_LIST_DATA;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<Data>> {
        decode_data_list(reader)
    }
}

/// Returns every value of the map.
#[derive(Debug, Clone, Copy)]
pub struct MapValuesCodec<'a> {
    /// Map name.
    pub name: &'a str,
}

impl OperationCodec for MapValuesCodec<'_> {
    type Response = Vec<Data>;

    const NAME: &'static str = "Map.values";
    const REQUEST_TYPE: u16 = MAP_VALUES;
    const RESPONSE_TYPE: u16 = RESPONSE_LIST_DATA;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<Data>> {
        decode_data_list(reader)
    }
}

/// Returns every key/value pair of the map.
#[derive(Debug, Clone, Copy)]
pub struct MapEntrySetCodec<'a> {
    /// Map name.
    pub name: &'a str,
}

impl OperationCodec for MapEntrySetCodec<'_> {
    type Response = Vec<(Data, Data)>;

    const NAME: &'static str = "Map.entrySet";
    const REQUEST_TYPE: u16 = MAP_ENTRY_SET;
    const RESPONSE_TYPE: u16 = RESPONSE_LIST_ENTRY;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<Vec<(Data, Data)>> {
        reader.get_data_entries()
    }
}

/// Subscribes to entry events of a map.
///
/// The registration id is chosen by the client and echoed at the start of
/// every event payload.
#[derive(Debug, Clone, Copy)]
pub struct MapAddEntryListenerCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Client-chosen registration id.
    pub registration_id: &'a str,
    /// Whether events carry values.
    pub include_value: bool,
}

impl OperationCodec for MapAddEntryListenerCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Map.addEntryListener";
    const REQUEST_TYPE: u16 = MAP_ADD_ENTRY_LISTENER;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + string_size(self.registration_id) + BOOLEAN_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_str(self.registration_id)
            .put_bool(self.include_value);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Cancels an entry listener subscription.
#[derive(Debug, Clone, Copy)]
pub struct MapRemoveEntryListenerCodec<'a> {
    /// Map name.
    pub name: &'a str,
    /// Registration id passed when subscribing.
    pub registration_id: &'a str,
}

impl OperationCodec for MapRemoveEntryListenerCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "Map.removeEntryListener";
    const REQUEST_TYPE: u16 = MAP_REMOVE_ENTRY_LISTENER;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = true;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + string_size(self.registration_id)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name).put_str(self.registration_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Kind of change an entry event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryEventType {
    /// An entry was added.
    Added,
    /// An entry was removed.
    Removed,
    /// An entry's value changed.
    Updated,
    /// An entry was evicted.
    Evicted,
    /// An entry expired.
    Expired,
    /// All entries were evicted.
    EvictAll,
    /// The map was cleared.
    ClearAll,
    /// An entry was merged after a split-brain heal.
    Merged,
}

impl EntryEventType {
    /// Returns the wire value.
    pub fn value(self) -> i32 {
        match self {
            Self::Added => 1,
            Self::Removed => 2,
            Self::Updated => 4,
            Self::Evicted => 8,
            Self::Expired => 16,
            Self::EvictAll => 32,
            Self::ClearAll => 64,
            Self::Merged => 128,
        }
    }

    /// Parses the wire value.
    pub fn from_value(value: i32) -> Result<Self> {
        Ok(match value {
            1 => Self::Added,
            2 => Self::Removed,
            4 => Self::Updated,
            8 => Self::Evicted,
            16 => Self::Expired,
            32 => Self::EvictAll,
            64 => Self::ClearAll,
            128 => Self::Merged,
            other => {
                return Err(HazelcastError::MalformedFrame(format!(
                    "unknown entry event type {}",
                    other
                )))
            }
        })
    }
}

/// A decoded map entry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEvent {
    /// Registration the event was pushed for.
    pub registration_id: String,
    /// Key of the affected entry.
    pub key: Option<Data>,
    /// New value, if values are included.
    pub value: Option<Data>,
    /// Previous value, if values are included.
    pub old_value: Option<Data>,
    /// Kind of change.
    pub event_type: EntryEventType,
    /// Member that produced the event.
    pub member_uuid: String,
    /// Number of entries affected by map-wide events.
    pub affected_entries: i32,
}

impl EntryEvent {
    /// Decodes an entry event frame.
    pub fn decode(frame: &Frame) -> Result<Self> {
        expect_message_type(frame, EVENT_ENTRY)?;
        let mut reader = frame.reader();
        Ok(Self {
            registration_id: reader.get_str()?,
            key: reader.get_nullable_data()?,
            value: reader.get_nullable_data()?,
            old_value: reader.get_nullable_data()?,
            event_type: EntryEventType::from_value(reader.get_i32()?)?,
            member_uuid: reader.get_str()?,
            affected_entries: reader.get_i32()?,
        })
    }

    /// Encodes the event as a member would push it.
    pub fn encode(&self) -> Frame {
        let size = HEADER_SIZE
            + string_size(&self.registration_id)
            + nullable_data_size(self.key.as_ref())
            + nullable_data_size(self.value.as_ref())
            + nullable_data_size(self.old_value.as_ref())
            + INT_SIZE
            + string_size(&self.member_uuid)
            + INT_SIZE;
        let mut builder = FrameBuilder::new(EVENT_ENTRY, size);
        builder
            .put_str(&self.registration_id)
            .put_nullable_data(self.key.as_ref())
            .put_nullable_data(self.value.as_ref())
            .put_nullable_data(self.old_value.as_ref())
            .put_i32(self.event_type.value())
            .put_str(&self.member_uuid)
            .put_i32(self.affected_entries);
        let mut frame = builder.finish();
        frame.add_flags(EVENT_FLAG);
        frame
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<MapPutCodec<'static>>();
    registry.register::<MapGetCodec<'static>>();
    registry.register::<MapRemoveCodec<'static>>();
    registry.register::<MapContainsKeyCodec<'static>>();
    registry.register::<MapSizeCodec<'static>>();
    registry.register::<MapClearCodec<'static>>();
    registry.register::<MapAddIndexCodec<'static>>();
    registry.register::<MapLockCodec<'static>>();
    registry.register::<MapForceUnlockCodec<'static>>();
    registry.register::<MapAddEntryListenerCodec<'static>>();
    registry.register::<MapRemoveEntryListenerCodec<'static>>();
    registry.register::<MapGetEntryViewCodec<'static>>();
    registry.register::<MapKeySetCodec<'static>>();
    registry.register::<MapValuesCodec<'static>>();
    registry.register::<MapEntrySetCodec<'static>>();
}
