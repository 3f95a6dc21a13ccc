//! Encoder and buffered decoder for wirecall frames.

use crate::compress::CompressKind;
use crate::error::ProtocolError;
use crate::header::{Header, MessageType, HEADER_SIZE};
use crate::message::{RpcRequest, RpcResponse};
use crate::serialize::SerializeKind;
use crate::MAX_BODY_SIZE;
use bytes::{Buf, BytesMut};

/// A decoded frame: header plus typed body.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub body: FrameBody,
}

/// Typed frame payload. Ping and pong frames carry none.
#[derive(Debug, Clone)]
pub enum FrameBody {
    Request(RpcRequest),
    Response(RpcResponse),
    Empty,
}

/// Encodes envelopes into wire frames: serialize, compress, prepend the
/// header with the computed full length. On any failure no partial frame
/// is produced.
pub struct Encoder;

impl Encoder {
    /// Encodes a request frame with the given body strategies.
    pub fn encode_request(
        request: &RpcRequest,
        serialize: SerializeKind,
        compress: CompressKind,
    ) -> Result<BytesMut, ProtocolError> {
        let header = Header::new(MessageType::Request, compress, serialize, request.request_id);
        Self::assemble(header, serialize.serialize(request)?)
    }

    /// Encodes a response frame with the strategies the response names.
    pub fn encode_response(response: &RpcResponse) -> Result<BytesMut, ProtocolError> {
        let header = Header::new(
            MessageType::Response,
            response.compress,
            response.serialize,
            response.request_id,
        );
        Self::assemble(header, response.serialize.serialize(response)?)
    }

    /// Encodes a bodyless ping or pong frame.
    pub fn encode_control(message_type: MessageType, request_id: u64) -> BytesMut {
        let header = Header::new(
            message_type,
            CompressKind::default(),
            SerializeKind::default(),
            request_id,
        );
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode_into(&mut buf, 0);
        buf
    }

    fn assemble(header: Header, serialized: Vec<u8>) -> Result<BytesMut, ProtocolError> {
        let body = header.compress.compress(&serialized)?;
        if body.len() > MAX_BODY_SIZE as usize {
            return Err(ProtocolError::FrameTooLarge {
                size: body.len() as u32,
                max: MAX_BODY_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
        header.encode_into(&mut buf, body.len());
        buf.extend_from_slice(&body);
        Ok(buf)
    }
}

/// Incremental frame decoder over a byte stream.
///
/// Feed socket reads in with [`extend`](Self::extend); [`decode_frame`]
/// (Self::decode_frame) returns `Ok(None)` until a complete frame is
/// buffered. Any `Err` means the stream is unrecoverable and the
/// connection must be closed.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Validate the header before waiting for the body so a bad magic
        // byte surfaces immediately.
        let (header, body_len) = Header::decode(&self.buffer[..HEADER_SIZE])?;
        if self.buffer.len() < HEADER_SIZE + body_len {
            return Ok(None);
        }

        self.buffer.advance(HEADER_SIZE);
        let body = self.buffer.split_to(body_len);

        let body = match header.message_type {
            MessageType::Request => {
                let raw = header.compress.decompress(&body)?;
                FrameBody::Request(header.serialize.deserialize(&raw)?)
            }
            MessageType::Response => {
                let raw = header.compress.decompress(&body)?;
                FrameBody::Response(header.serialize.deserialize(&raw)?)
            }
            MessageType::Ping | MessageType::Pong => FrameBody::Empty,
        };

        Ok(Some(Frame { header, body }))
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
