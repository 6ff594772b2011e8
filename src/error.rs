//! # Error Types
//!
//! Error handling for call correlation, dispatch and binding.
//!
//! Every failure that can reach a caller's future, a handler invocation or the
//! session driver is a variant of [`RpcError`].
//!
//! ## Error Categories
//! - **Decoding Errors**: malformed bytes or type mismatch while deserializing
//! - **Remote Failures**: the peer reported an exception while running a call
//! - **Binding Errors**: argument count or type mismatch before a handler runs
//! - **Framing Errors**: invalid headers, unsupported versions, oversized packets
//! - **Session Errors**: closed connections, cancelled or timed out calls
//!
//! ## Example Usage
//! ```rust
//! use fast_rpc::error::{RpcError, RemoteFailure};
//!
//! let err = RpcError::Remote(RemoteFailure::new("boom"));
//! assert!(err.is_remote());
//! assert_eq!(err.failure_message(), "boom");
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_DUPLICATE_ID: &str = "Packet id already has a pending call";

    /// Action table errors
    pub const ERR_TABLE_WRITE_LOCK: &str = "Failed to acquire write lock on action table";
    pub const ERR_TABLE_READ_LOCK: &str = "Failed to acquire read lock on action table";
    pub const ERR_API_NAME_TOO_LONG: &str = "Api name exceeds 255 bytes";

    /// Framing errors
    pub const ERR_TRUNCATED_SEGMENT: &str = "Body segment truncated";

    /// Session errors
    pub const ERR_SERIALIZER_MISMATCH: &str =
        "Action table serializer does not match the session serialization";
}

/// A failure reported by the peer while processing one of our calls.
///
/// Only the diagnostic text crosses the wire; it is never a serialized error
/// object, so peers written against other serializers can still interoperate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteFailure {
    message: String,
}

impl RemoteFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build a failure from an exception packet body. Absent or invalid UTF-8
    /// bytes never fail; invalid sequences are replaced.
    pub fn from_body(body: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(body).into_owned())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// RpcError is the primary error type for all rpc operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Deserialize error: {0}")]
    Deserialize(String),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteFailure),

    #[error("Duplicate pending call id: {0}")]
    DuplicateId(u64),

    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Argument {index} is not a {expected}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
    },

    #[error("Api not found: {0}")]
    ApiNotFound(String),

    #[error("Api already registered: {0}")]
    DuplicateApi(String),

    #[error("Invalid packet header")]
    InvalidHeader,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Call cancelled")]
    Cancelled,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl RpcError {
    /// True when the failure came from the peer rather than from local decoding.
    pub fn is_remote(&self) -> bool {
        matches!(self, RpcError::Remote(_))
    }

    /// Plain diagnostic text sent back to a caller when a handler fails.
    ///
    /// Remote failures and custom handler errors carry their text unchanged
    /// so a failure relayed through several peers does not accumulate prefixes.
    pub fn failure_message(&self) -> String {
        match self {
            RpcError::Remote(failure) => failure.message().to_string(),
            RpcError::Custom(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<bincode::Error> for RpcError {
    fn from(err: bincode::Error) -> Self {
        RpcError::Deserialize(err.to_string())
    }
}

/// Type alias for Results using RpcError
pub type Result<T> = std::result::Result<T, RpcError>;
