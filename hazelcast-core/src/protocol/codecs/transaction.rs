//! Transaction lifecycle codecs.
//!
//! A transaction is created on one member and its id is then passed to the
//! transactional map, list and queue codecs. Commit and rollback must reach
//! the member that created the transaction.

use super::*;
use crate::protocol::builder::string_size;

/// How a transaction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
    /// Prepare on every participant before committing.
    #[default]
    TwoPhase,
    /// Commit without a prepare round.
    OnePhase,
}

impl TransactionType {
    /// Wire value of the type.
    pub fn value(self) -> i32 {
        match self {
            TransactionType::TwoPhase => 1,
            TransactionType::OnePhase => 2,
        }
    }
}

/// Begins a transaction and returns its id.
#[derive(Debug, Clone, Copy)]
pub struct TransactionCreateCodec {
    /// Time after which the member rolls the transaction back.
    pub timeout_millis: i64,
    /// Number of backups the transaction log is copied to.
    pub durability: i32,
    /// Commit protocol.
    pub transaction_type: TransactionType,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for TransactionCreateCodec {
    type Response = String;

    const NAME: &'static str = "Transaction.create";
    const REQUEST_TYPE: u16 = TRANSACTION_CREATE;
    const RESPONSE_TYPE: u16 = RESPONSE_STRING;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + 2 * LONG_SIZE + 2 * INT_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder
            .put_i64(self.timeout_millis)
            .put_i32(self.durability)
            .put_i32(self.transaction_type.value())
            .put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<String> {
        reader.get_str()
    }
}

/// Commits a transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionCommitCodec<'a> {
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for TransactionCommitCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Transaction.commit";
    const REQUEST_TYPE: u16 = TRANSACTION_COMMIT;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.txn_id) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.txn_id).put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

/// Rolls a transaction back.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRollbackCodec<'a> {
    /// Transaction id.
    pub txn_id: &'a str,
    /// Id of the calling thread.
    pub thread_id: i64,
}

impl OperationCodec for TransactionRollbackCodec<'_> {
    type Response = ();

    const NAME: &'static str = "Transaction.rollback";
    const REQUEST_TYPE: u16 = TRANSACTION_ROLLBACK;
    const RESPONSE_TYPE: u16 = RESPONSE_VOID;
    const RETRYABLE: bool = false;

    fn calculate_data_size(&self) -> usize {
        HEADER_SIZE + string_size(self.txn_id) + LONG_SIZE
    }

    fn encode_payload(&self, builder: &mut FrameBuilder) {
        builder.put_str(self.txn_id).put_i64(self.thread_id);
    }

    fn decode_payload(reader: &mut FrameReader<'_>) -> Result<()> {
        decode_void(reader)
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.register::<TransactionCreateCodec>();
    registry.register::<TransactionCommitCodec<'static>>();
    registry.register::<TransactionRollbackCodec<'static>>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_returns_transaction_id() {
        let codec = TransactionCreateCodec {
            timeout_millis: 120_000,
            durability: 1,
            transaction_type: TransactionType::OnePhase,
            thread_id: 8,
        };
        let frame = codec.encode_request();
        assert_eq!(frame.message_type(), TRANSACTION_CREATE);
        assert_eq!(frame.len(), codec.calculate_data_size());
        assert!(!frame.is_retryable());
        assert!(codec.partition_hash().is_none());

        let mut reader = frame.reader();
        assert_eq!(reader.get_i64().unwrap(), 120_000);
        assert_eq!(reader.get_i32().unwrap(), 1);
        assert_eq!(reader.get_i32().unwrap(), 2);
        assert_eq!(reader.get_i64().unwrap(), 8);
        assert_eq!(reader.remaining(), 0);

        let id = TransactionCreateCodec::decode_response(&response::string("txn-42")).unwrap();
        assert_eq!(id, "txn-42");
        assert!(TransactionCreateCodec::decode_response(&response::void()).is_err());
    }

    #[test]
    fn test_commit_and_rollback_carry_id() {
        let commit = TransactionCommitCodec {
            txn_id: "txn-42",
            thread_id: 8,
        }
        .encode_request();
        let rollback = TransactionRollbackCodec {
            txn_id: "txn-42",
            thread_id: 8,
        }
        .encode_request();
        assert_eq!(commit.message_type(), TRANSACTION_COMMIT);
        assert_eq!(rollback.message_type(), TRANSACTION_ROLLBACK);
        for frame in [&commit, &rollback] {
            let mut reader = frame.reader();
            assert_eq!(reader.get_str().unwrap(), "txn-42");
            assert_eq!(reader.get_i64().unwrap(), 8);
        }
        TransactionCommitCodec::decode_response(&response::void()).unwrap();
        TransactionRollbackCodec::decode_response(&response::void()).unwrap();

        let registry = CodecRegistry::standard();
        for request_type in [TRANSACTION_CREATE, TRANSACTION_COMMIT, TRANSACTION_ROLLBACK] {
            assert!(!registry.get(request_type).unwrap().retryable);
        }
    }
}
