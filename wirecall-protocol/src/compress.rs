//! Body compression strategies.
//!
//! Each strategy is identified by the compress-type byte carried in the
//! frame header. Adding a strategy (zstd, say) is a new variant plus match
//! arms; callers select by kind and never change.

use crate::error::ProtocolError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Lossless body transform, one byte on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressKind {
    /// DEFLATE-family gzip compression (the default).
    #[default]
    Gzip,
    /// Pass bytes through unchanged.
    None,
}

impl CompressKind {
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(CompressKind::Gzip),
            1 => Ok(CompressKind::None),
            other => Err(ProtocolError::UnknownCompressKind(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            CompressKind::Gzip => 0,
            CompressKind::None => 1,
        }
    }

    /// Transforms `body` for the wire.
    pub fn compress(self, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        match self {
            CompressKind::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(body)?;
                Ok(encoder.finish()?)
            }
            CompressKind::None => Ok(body.to_vec()),
        }
    }

    /// Inverts [`compress`](Self::compress).
    pub fn decompress(self, body: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        match self {
            CompressKind::Gzip => {
                let mut decoder = GzDecoder::new(body);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out)?;
                Ok(out)
            }
            CompressKind::None => Ok(body.to_vec()),
        }
    }
}
