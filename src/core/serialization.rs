//! # Serialization Formats
//!
//! The [`Serializer`] contract used to encode call arguments and results, and
//! [`SerializationFormat`], the stock implementation over bincode (default),
//! JSON (debugging/interop) and MessagePack (compact encoding).
//!
//! The core never inspects encoded bytes; it only relies on `deserialize`
//! failing with [`RpcError::Deserialize`] on malformed or type-incompatible
//! input.
//!
//! ## Usage
//! ```rust
//! use fast_rpc::core::serialization::{SerializationFormat, Serializer};
//!
//! let format = SerializationFormat::Json;
//! let bytes = format.serialize(&vec![1u32, 2, 3]).unwrap();
//! let back: Vec<u32> = format.deserialize(&bytes).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

use crate::error::{Result, RpcError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Encode/decode contract the dispatch core depends on.
pub trait Serializer: Send + Sync + 'static {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// The stock format this serializer speaks, if it is one of them.
    fn format(&self) -> Option<SerializationFormat> {
        None
    }
}

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

impl std::str::FromStr for SerializationFormat {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" => Ok(SerializationFormat::Bincode),
            "json" => Ok(SerializationFormat::Json),
            "messagepack" | "msgpack" => Ok(SerializationFormat::MessagePack),
            other => Err(RpcError::ConfigError(format!(
                "Unknown serialization format: {other}"
            ))),
        }
    }
}

impl Serializer for SerializationFormat {
    fn format(&self) -> Option<SerializationFormat> {
        Some(*self)
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Bincode => {
                bincode::serialize(value).map_err(|e| RpcError::Serialize(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::to_vec(value).map_err(|e| RpcError::Serialize(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::to_vec(value).map_err(|e| RpcError::Serialize(e.to_string()))
            }
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Bincode => {
                bincode::deserialize(bytes).map_err(|e| RpcError::Deserialize(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| RpcError::Deserialize(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::from_slice(bytes).map_err(|e| RpcError::Deserialize(e.to_string()))
            }
        }
    }
}
