//! Distributed lock codecs.

use super::*;
use crate::protocol::builder::string_size;

/// Unconditionally releases a lock regardless of its owner.
///
/// Not retryable: resending after a possible success could release a lock
/// that another caller acquired in between.
#[derive(Debug, Clone, Copy)]
pub struct LockForceUnlockCodec<'a> {
    /// Lock name.
    pub name: &'a str,
}

impl OperationCodec for LockForceUnlockCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Lock.forceUnlock";
    const REQUEST_TYPE: u16 = LOCK_FORCE_UNLOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name)
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Acquires a lock, blocking server-side until it is available.
#[derive(Debug, Clone, Copy)]
pub struct LockLockCodec<'a> {
    /// Lock name.
    pub name: &'a str,
    /// Lease time in milliseconds, `-1` for no lease.
    pub lease_time_millis: i64,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for LockLockCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Lock.lock";
    const REQUEST_TYPE: u16 = LOCK_LOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + LONG_SIZE + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_i64(self.lease_time_millis)
            .put_i64(self.thread_id);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Releases a lock held by the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct LockUnlockCodec<'a> {
    /// Lock name.
    pub name: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for LockUnlockCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Lock.unlock";
    const REQUEST_TYPE: u16 = LOCK_UNLOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.name).put_i64(self.thread_id);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Returns whether a lock is currently held by anyone.
#[derive(Debug, Clone, Copy)]
pub struct LockIsLockedCodec<'a> {
    /// Lock name.
    pub name: &'a str,
}

impl OperationCodec for LockIsLockedCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "Lock.isLocked";
    const REQUEST_TYPE: u16 = LOCK_IS_LOCKED;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
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

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

/// Tries to acquire a lock within a timeout.
///
/// `timeout_millis` is an operation argument evaluated by the member; it
/// is independent of the client's invocation timeout.
#[derive(Debug, Clone, Copy)]
pub struct LockTryLockCodec<'a> {
    /// Lock name.
    pub name: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
    /// Lease time in milliseconds, `-1` for no lease.
    pub lease_millis: i64,
    /// How long the member waits for the lock.
    pub timeout_millis: i64,
}

impl OperationCodec for LockTryLockCodec<'_> {
    type Response = bool;

    const NAME: &'static str = "Lock.tryLock";
    const REQUEST_TYPE: u16 = LOCK_TRY_LOCK;
    const RESPONSE_TYPE: u16 = RESPONSE_BOOLEAN;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.name) + 3 * LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_str(self.name)
            .put_i64(self.thread_id)
            .put_i64(self.lease_millis)
            .put_i64(self.timeout_millis);
    }

    fn partition_hash(&self) -> Option<i32> {
        Some(name_partition_hash(self.name))
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<bool> {
        decode_bool(reader)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<LockForceUnlockCodec<'static>>();
    registry.register::<LockLockCodec<'static>>();
    registry.register::<LockUnlockCodec<'static>>();
    registry.register::<LockIsLockedCodec<'static>>();
    registry.register::<LockTryLockCodec<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameCodec;
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn test_force_unlock_roundtrip() {
        let codec = LockForceUnlockCodec { name: "myLock" };
        let frame = codec.encode_request();
        assert_eq!(frame.len(), codec.calculate_data_size());
        assert!(!frame.is_retryable());

        let mut wire = FrameCodec::new();
        let mut buf = BytesMut::new();
        wire.encode(&frame, &mut buf).unwrap();
        let decoded = wire.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.message_type(), LOCK_FORCE_UNLOCK);
        let mut reader = decoded.reader();
        assert_eq!(reader.get_str().unwrap(), "myLock");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_routes_by_lock_name() {
        let hash = Some(name_partition_hash("myLock"));
        assert_eq!(LockForceUnlockCodec { name: "myLock" }.partition_hash(), hash);
        let lock = LockLockCodec {
            name: "myLock",
            lease_time_millis: -1,
            thread_id: 1,
        };
        assert_eq!(lock.partition_hash(), hash);
        assert!(lock.partition_key().is_none());
        assert_ne!(LockIsLockedCodec { name: "other" }.partition_hash(), hash);
    }

    #[test]
    fn test_force_unlock_response() {
        LockForceUnlockCodec::decode_response(&response::void()).unwrap();
        assert!(LockForceUnlockCodec::decode_response(&response::boolean(true)).is_err());
    }

    #[test]
    fn test_try_lock_layout() {
        let frame = LockTryLockCodec {
            name: "l",
            thread_id: 1,
            lease_millis: -1,
            timeout_millis: 500,
        }
        .encode_request();
        let mut reader = frame.reader();
        assert_eq!(reader.get_str().unwrap(), "l");
        assert_eq!(reader.get_i64().unwrap(), 1);
        assert_eq!(reader.get_i64().unwrap(), -1);
        assert_eq!(reader.get_i64().unwrap(), 500);
        assert!(LockTryLockCodec::decode_response(&response::boolean(true)).unwrap());
    }
}
