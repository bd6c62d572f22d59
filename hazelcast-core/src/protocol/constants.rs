//! Protocol constants for the Hazelcast client binary protocol.
//!
//! Header layout (all fields little-endian):
//!
//! | offset | field          | size |
//! |--------|----------------|------|
//! | 0      | frame length   | 4    |
//! | 4      | version        | 1    |
//! | 5      | flags          | 1    |
//! | 6      | message type   | 2    |
//! | 8      | correlation id | 8    |
//! | 16     | partition id   | 4    |
//! | 20     | data offset    | 2    |

/// Protocol version implemented by this client.
pub const PROTOCOL_VERSION: u8 = 1;

/// Bytes written once by the client right after the socket connects.
pub const CLIENT_PROTOCOL_PREAMBLE: &[u8; 3] = b"CB2";

/// Offset of the frame length field.
pub const FRAME_LENGTH_OFFSET: usize = 0;
/// Offset of the version byte.
pub const VERSION_OFFSET: usize = FRAME_LENGTH_OFFSET + 4;
/// Offset of the flags byte.
pub const FLAGS_OFFSET: usize = VERSION_OFFSET + 1;
/// Offset of the message type.
pub const TYPE_OFFSET: usize = FLAGS_OFFSET + 1;
/// Offset of the correlation id.
pub const CORRELATION_ID_OFFSET: usize = TYPE_OFFSET + 2;
/// Offset of the partition id.
pub const PARTITION_ID_OFFSET: usize = CORRELATION_ID_OFFSET + 8;
/// Offset of the data offset field.
pub const DATA_OFFSET_OFFSET: usize = PARTITION_ID_OFFSET + 4;
/// Total header size; payload starts here.
pub const HEADER_SIZE: usize = DATA_OFFSET_OFFSET + 2;

/// Marks the first frame of a message.
pub const BEGIN_FLAG: u8 = 0x80;
/// Marks the last frame of a message.
pub const END_FLAG: u8 = 0x40;
/// Marks an event pushed by a member.
pub const EVENT_FLAG: u8 = 0x01;
/// Flags of a complete single-frame message.
pub const BEGIN_END_FLAGS: u8 = BEGIN_FLAG | END_FLAG;
/// All flag bits this protocol version defines.
pub const KNOWN_FLAGS: u8 = BEGIN_FLAG | END_FLAG | EVENT_FLAG;

/// Partition id of a frame that is not key-scoped.
pub const PARTITION_ID_ANY: i32 = -1;

/// Default upper bound for inbound frame size (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of a bool on the wire.
pub const BOOLEAN_SIZE: usize = 1;
/// Size of a byte on the wire.
pub const BYTE_SIZE: usize = 1;
/// Size of an i32 on the wire.
pub const INT_SIZE: usize = 4;
/// Size of an i64 on the wire.
pub const LONG_SIZE: usize = 8;

// Response types.

/// Empty response.
pub const RESPONSE_VOID: u16 = 100;
/// Single boolean response.
pub const RESPONSE_BOOLEAN: u16 = 101;
/// Single i32 response.
pub const RESPONSE_INTEGER: u16 = 102;
/// Single i64 response.
pub const RESPONSE_LONG: u16 = 103;
/// Single string response.
pub const RESPONSE_STRING: u16 = 104;
/// Single nullable `Data` response.
pub const RESPONSE_DATA: u16 = 105;
/// List of `Data` response.
pub const RESPONSE_LIST_DATA: u16 = 106;
/// Authentication result.
pub const RESPONSE_AUTHENTICATION: u16 = 107;
/// Partition table.
pub const RESPONSE_PARTITIONS: u16 = 108;
/// Server-side error.
pub const RESPONSE_EXCEPTION: u16 = 109;
/// List of key/value `Data` pairs.
pub const RESPONSE_LIST_ENTRY: u16 = 110;
/// Nullable map entry view.
pub const RESPONSE_ENTRY_VIEW: u16 = 111;
/// Nullable class definition.
pub const RESPONSE_CLASS_DEFINITION: u16 = 112;

// Event types.

/// Map entry event.
pub const EVENT_ENTRY: u16 = 203;

// Request types, grouped by service in the high byte.

/// Client authentication.
pub const CLIENT_AUTHENTICATION: u16 = 0x0002;
/// Fetch the partition table.
pub const CLIENT_GET_PARTITIONS: u16 = 0x0008;
/// Heartbeat.
pub const CLIENT_PING: u16 = 0x000f;
/// Fetch a Portable class definition.
pub const CLIENT_FETCH_CLASS_DEFINITION: u16 = 0x0020;

/// Map put.
pub const MAP_PUT: u16 = 0x0101;
/// Map get.
pub const MAP_GET: u16 = 0x0102;
/// Map remove.
pub const MAP_REMOVE: u16 = 0x0103;
/// Map contains key.
pub const MAP_CONTAINS_KEY: u16 = 0x0109;
/// Map lock.
pub const MAP_LOCK: u16 = 0x0110;
/// Map force unlock.
pub const MAP_FORCE_UNLOCK: u16 = 0x0113;
/// Map get entry view.
pub const MAP_GET_ENTRY_VIEW: u16 = 0x011d;
/// Map add entry listener.
pub const MAP_ADD_ENTRY_LISTENER: u16 = 0x011a;
/// Map remove entry listener.
pub const MAP_REMOVE_ENTRY_LISTENER: u16 = 0x011c;
/// Map key set.
pub const MAP_KEY_SET: u16 = 0x0122;
/// Map values.
pub const MAP_VALUES: u16 = 0x0124;
/// Map entry set.
pub const MAP_ENTRY_SET: u16 = 0x0125;
/// Map add index.
pub const MAP_ADD_INDEX: u16 = 0x0126;
/// Map size.
pub const MAP_SIZE: u16 = 0x012a;
/// Map clear.
pub const MAP_CLEAR: u16 = 0x012d;

/// MultiMap put.
pub const MULTIMAP_PUT: u16 = 0x0201;
/// MultiMap get.
pub const MULTIMAP_GET: u16 = 0x0202;
/// MultiMap remove.
pub const MULTIMAP_REMOVE: u16 = 0x0203;
/// MultiMap value count.
pub const MULTIMAP_VALUE_COUNT: u16 = 0x020d;

/// Queue offer.
pub const QUEUE_OFFER: u16 = 0x0301;
/// Queue size.
pub const QUEUE_SIZE: u16 = 0x0303;
/// Queue poll.
pub const QUEUE_POLL: u16 = 0x0305;

/// List remove at index.
pub const LIST_REMOVE_AT: u16 = 0x0504;

/// Lock is-locked.
pub const LOCK_IS_LOCKED: u16 = 0x0701;
/// Lock lock.
pub const LOCK_LOCK: u16 = 0x0705;
/// Lock unlock.
pub const LOCK_UNLOCK: u16 = 0x0706;
/// Lock force unlock.
pub const LOCK_FORCE_UNLOCK: u16 = 0x0707;
/// Lock try-lock.
pub const LOCK_TRY_LOCK: u16 = 0x0708;

/// Transactional map get.
pub const TXN_MAP_GET: u16 = 0x1002;
/// Transactional map put.
pub const TXN_MAP_PUT: u16 = 0x1006;
/// Transactional map remove.
pub const TXN_MAP_REMOVE: u16 = 0x100b;

/// Transactional list add.
pub const TXN_LIST_ADD: u16 = 0x1101;
/// Transactional list remove.
pub const TXN_LIST_REMOVE: u16 = 0x1102;
/// Transactional list size.
pub const TXN_LIST_SIZE: u16 = 0x1103;

/// Transactional queue offer.
pub const TXN_QUEUE_OFFER: u16 = 0x1201;
/// Transactional queue poll.
pub const TXN_QUEUE_POLL: u16 = 0x1202;

/// Begin a transaction.
pub const TRANSACTION_CREATE: u16 = 0x1301;
/// Commit a transaction.
pub const TRANSACTION_COMMIT: u16 = 0x1302;
/// Roll back a transaction.
pub const TRANSACTION_ROLLBACK: u16 = 0x1303;

/// Returns true for every request, response and event type defined above.
///
/// Types with the high bit set read as negative on the wire and are never
/// known.
pub fn is_known_message_type(message_type: u16) -> bool {
    matches!(
        message_type,
        RESPONSE_VOID..=RESPONSE_CLASS_DEFINITION
            | EVENT_ENTRY
            | CLIENT_AUTHENTICATION
            | CLIENT_GET_PARTITIONS
            | CLIENT_PING
            | CLIENT_FETCH_CLASS_DEFINITION
            | MAP_PUT
            | MAP_GET
            | MAP_REMOVE
            | MAP_CONTAINS_KEY
            | MAP_LOCK
            | MAP_FORCE_UNLOCK
            | MAP_GET_ENTRY_VIEW
            | MAP_ADD_ENTRY_LISTENER
            | MAP_REMOVE_ENTRY_LISTENER
            | MAP_KEY_SET
            | MAP_VALUES
            | MAP_ENTRY_SET
            | MAP_ADD_INDEX
            | MAP_SIZE
            | MAP_CLEAR
            | MULTIMAP_PUT
            | MULTIMAP_GET
            | MULTIMAP_REMOVE
            | MULTIMAP_VALUE_COUNT
            | QUEUE_OFFER
            | QUEUE_SIZE
            | QUEUE_POLL
            | LIST_REMOVE_AT
            | LOCK_IS_LOCKED
            | LOCK_LOCK
            | LOCK_UNLOCK
            | LOCK_FORCE_UNLOCK
            | LOCK_TRY_LOCK
            | TXN_MAP_GET
            | TXN_MAP_PUT
            | TXN_MAP_REMOVE
            | TXN_LIST_ADD
            | TXN_LIST_REMOVE
            | TXN_LIST_SIZE
            | TXN_QUEUE_OFFER
            | TXN_QUEUE_POLL
            | TRANSACTION_CREATE
            | TRANSACTION_COMMIT
            | TRANSACTION_ROLLBACK
    )
}
