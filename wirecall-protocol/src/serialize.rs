//! Body serialization strategies.
//!
//! Each strategy is identified by the serialize-type byte carried in the
//! frame header; both peers must share the byte-to-strategy mapping. The
//! MessagePack strategy encodes structs as maps (`to_vec_named`) so field
//! names travel with the data and the receiver can decode dynamically typed
//! values without knowing their exact shape ahead of time.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Body encoding scheme, one byte on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializeKind {
    /// Self-describing binary encoding (the default).
    #[default]
    MessagePack,
    /// UTF-8 JSON text.
    Json,
}

impl SerializeKind {
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(SerializeKind::MessagePack),
            1 => Ok(SerializeKind::Json),
            other => Err(ProtocolError::UnknownSerializeKind(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            SerializeKind::MessagePack => 0,
            SerializeKind::Json => 1,
        }
    }

    /// Turns a value into bytes with this strategy.
    pub fn serialize<T: Serialize>(self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        match self {
            SerializeKind::MessagePack => Ok(rmp_serde::to_vec_named(value)?),
            SerializeKind::Json => Ok(serde_json::to_vec(value)?),
        }
    }

    /// Inverts [`serialize`](Self::serialize).
    pub fn deserialize<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, ProtocolError> {
        match self {
            SerializeKind::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
            SerializeKind::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}
