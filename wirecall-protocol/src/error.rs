//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or body handling.
///
/// Header errors (bad magic, unsupported version, unknown enum bytes) are
/// fatal to the connection they occur on; there is no resynchronization.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic byte: {0:#04x}")]
    InvalidMagic(u8),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("unknown serialize kind: {0}")]
    UnknownSerializeKind(u8),

    #[error("unknown compress kind: {0}")]
    UnknownCompressKind(u8),

    #[error("invalid frame length: {0}")]
    InvalidLength(u32),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode error: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::InvalidMagic(0x99);
        assert!(err.to_string().contains("0x99"));

        let err = ProtocolError::UnsupportedVersion(7);
        assert!(err.to_string().contains("7"));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        let msg = err.to_string();
        assert!(msg.contains("100") && msg.contains("50"));

        let err = ProtocolError::UnknownSerializeKind(42);
        assert!(err.to_string().contains("42"));
    }
}
