//! Fixed-size binary header for wirecall frames.
//!
//! Layout (17 bytes, big-endian multi-byte fields):
//!
//! ```text
//! +-------+---------+-------------+------+----------+-----------+------------+
//! | magic | version | full length | type | compress | serialize | request id |
//! | 1 B   |  1 B    |    4 B      | 1 B  |   1 B    |    1 B    |    8 B     |
//! +-------+---------+-------------+------+----------+-----------+------------+
//! ```
//!
//! `full length` counts the header plus the compressed body, so a receiver
//! reads exactly `full length - 17` body bytes after the header.

use crate::compress::CompressKind;
use crate::error::ProtocolError;
use crate::serialize::SerializeKind;
use crate::{MAX_BODY_SIZE, PROTOCOL_VERSION};
use bytes::{Buf, BufMut, BytesMut};

/// Magic byte identifying wirecall frames.
pub const MAGIC: u8 = 0x1d;

/// Size of the fixed frame header in bytes (1+1+4+1+1+1+8 = 17).
pub const HEADER_SIZE: usize = 17;

/// Frame type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 1,
    Ping = 2,
    Pong = 3,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::Ping),
            3 => Ok(MessageType::Pong),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_type: MessageType,
    pub compress: CompressKind,
    pub serialize: SerializeKind,
    pub request_id: u64,
}

impl Header {
    pub fn new(
        message_type: MessageType,
        compress: CompressKind,
        serialize: SerializeKind,
        request_id: u64,
    ) -> Self {
        Self {
            message_type,
            compress,
            serialize,
            request_id,
        }
    }

    /// Writes the 17-byte header for a frame carrying `body_len` compressed
    /// body bytes.
    pub fn encode_into(&self, buf: &mut BytesMut, body_len: usize) {
        buf.reserve(HEADER_SIZE);
        buf.put_u8(MAGIC);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u32((HEADER_SIZE + body_len) as u32);
        buf.put_u8(self.message_type.as_byte());
        buf.put_u8(self.compress.as_byte());
        buf.put_u8(self.serialize.as_byte());
        buf.put_u64(self.request_id);
    }

    /// Parses a header from at least [`HEADER_SIZE`] bytes without consuming
    /// them, returning the header and the body length the frame declares.
    ///
    /// The magic byte is validated before any other field is interpreted; a
    /// mismatch means the stream is desynchronized and the connection must
    /// be closed.
    pub fn decode(mut bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let magic = bytes.get_u8();
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = bytes.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let full_length = bytes.get_u32() as usize;
        if full_length < HEADER_SIZE {
            return Err(ProtocolError::InvalidLength(full_length as u32));
        }
        let body_len = full_length - HEADER_SIZE;
        if body_len > MAX_BODY_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len as u32,
                max: MAX_BODY_SIZE,
            });
        }

        let message_type = MessageType::from_byte(bytes.get_u8())?;
        let compress = CompressKind::from_byte(bytes.get_u8())?;
        let serialize = SerializeKind::from_byte(bytes.get_u8())?;
        let request_id = bytes.get_u64();

        Ok((
            Self {
                message_type,
                compress,
                serialize,
                request_id,
            },
            body_len,
        ))
    }
}
