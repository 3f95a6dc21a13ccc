//! # wirecall-protocol
//!
//! Wire protocol implementation for wirecall.
//!
//! This crate provides:
//! - Fixed 17-byte binary frame header with big-endian fields
//! - Request/Response envelope types with dynamically typed arguments
//! - Pluggable body serialization (MessagePack, JSON) keyed by a header byte
//! - Pluggable body compression (gzip, none) keyed by a header byte
//! - Buffered incremental frame decoding

pub mod codec;
pub mod compress;
pub mod error;
pub mod header;
pub mod message;
pub mod serialize;

pub use codec::{Decoder, Encoder, Frame, FrameBody};
pub use compress::CompressKind;
pub use error::ProtocolError;
pub use header::{Header, MessageType, HEADER_SIZE, MAGIC};
pub use message::{RpcRequest, RpcResponse, CODE_ERROR, CODE_OK};
pub use serialize::SerializeKind;

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Default port for wirecall servers.
pub const DEFAULT_PORT: u16 = 9222;

/// Maximum frame body size after compression (16 MiB).
pub const MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;
