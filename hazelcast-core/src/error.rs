//! Error types for Hazelcast operations.

use std::io;
use thiserror::Error;

use crate::serialization::portable::ClassKey;

/// The main error type for Hazelcast operations.
///
/// Every public call either completes with a typed result or fails with one
/// of these variants.
#[derive(Debug, Error)]
pub enum HazelcastError {
    /// The byte stream does not form a valid frame. Fatal to the connection.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The peer speaks a different protocol version. Fatal to the connection.
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Version this client implements.
        expected: u8,
        /// Version found in the frame header.
        actual: u8,
    },

    /// A response frame carried a message type the codec does not accept.
    #[error("unexpected message type: expected {expected:#06x}, got {actual:#06x}")]
    UnexpectedMessageType {
        /// Response type the codec expects.
        expected: u16,
        /// Type found in the frame header.
        actual: u16,
    },

    /// A class definition with the same key but different fields already exists.
    #[error("schema conflict for {key}: {reason}")]
    SchemaConflict {
        /// The conflicting class key.
        key: ClassKey,
        /// Which part of the field list differs.
        reason: String,
    },

    /// A class definition could not be found locally or fetched in time.
    #[error("schema unavailable for {key}: {reason}")]
    SchemaUnavailable {
        /// The unresolved class key.
        key: ClassKey,
        /// Why resolution failed.
        reason: String,
    },

    /// A field name is not part of the class definition.
    #[error("unknown field '{field}' in {key}")]
    UnknownField {
        /// The class being read or written.
        key: ClassKey,
        /// The requested field name.
        field: String,
    },

    /// A field was accessed with a type other than its declared type.
    #[error("type mismatch for field '{field}': declared {expected}, requested {actual}")]
    TypeMismatch {
        /// The field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Requested type.
        actual: String,
    },

    /// The connection carrying the operation was lost.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The operation timed out or exhausted its retry budget.
    #[error("operation timed out or retries exhausted after {attempts} attempt(s): {reason}")]
    OperationTimeout {
        /// Number of send attempts made.
        attempts: u32,
        /// Last failure observed.
        reason: String,
    },

    /// The member answered with an error response.
    #[error("server error {code} ({class_name}): {message}")]
    Server {
        /// Numeric error code.
        code: i32,
        /// Server-side exception class.
        class_name: String,
        /// Server-side message, empty if none was sent.
        message: String,
    },

    /// Connection-related errors (connect failures, no member reachable).
    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol-related errors that are not framing corruption.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A transport-level timeout such as a connect timeout.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// Authentication errors (invalid credentials, failed login).
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HazelcastError {
    /// Returns true for transport failures that a retryable operation may
    /// transparently resend after.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }

    /// Returns true if the error means the connection that produced it must
    /// be closed.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_) | Self::VersionMismatch { .. } | Self::Io(_)
        )
    }
}

/// A specialized `Result` type for Hazelcast operations.
pub type Result<T> = std::result::Result<T, HazelcastError>;
