//! On-disk layout of a record container.
//!
//! ```text
//! +-----------+-------------------+-------------+-----------+-----------+
//! | "GRBREC01"| record payloads   | JSON index  | index len | "GRBRECIX"|
//! | 8 bytes   | back to back      |             | u64 LE    | 8 bytes   |
//! +-----------+-------------------+-------------+-----------+-----------+
//! ```
//!
//! Each index entry points at one payload and carries its type, compression,
//! raw length and the CRC32 of the uncompressed bytes.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::{RecordError, RecordResult, ValueKind};

pub(crate) const HEADER_MAGIC: &[u8; 8] = b"GRBREC01";
pub(crate) const TRAILER_MAGIC: &[u8; 8] = b"GRBRECIX";
pub(crate) const TRAILER_LEN: usize = 16;
pub(crate) const FORMAT_VERSION: u32 = 1;

/// Compression applied to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Stored as is.
    #[default]
    None,
    /// zlib-wrapped deflate.
    Deflate,
}

impl Compression {
    /// Parse from string (case-insensitive). Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "deflate" | "zlib" => Some(Self::Deflate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Deflate => "deflate",
        }
    }

    pub(crate) fn compress(&self, raw: &[u8]) -> RecordResult<Vec<u8>> {
        match self {
            Self::None => Ok(raw.to_vec()),
            Self::Deflate => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
                encoder
                    .write_all(raw)
                    .map_err(|e| RecordError::Compression(format!("deflate failed: {}", e)))?;
                encoder
                    .finish()
                    .map_err(|e| RecordError::Compression(format!("deflate failed: {}", e)))
            }
        }
    }

    pub(crate) fn decompress(&self, stored: &[u8], raw_length: usize) -> RecordResult<Vec<u8>> {
        match self {
            Self::None => Ok(stored.to_vec()),
            Self::Deflate => {
                // raw_length comes from the index and is only trusted after
                // the decoded length has been compared with it
                let mut raw = Vec::with_capacity(raw_length.min(stored.len().saturating_mul(4)));
                flate2::read::ZlibDecoder::new(stored)
                    .read_to_end(&mut raw)
                    .map_err(|e| RecordError::Compression(format!("inflate failed: {}", e)))?;
                Ok(raw)
            }
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location and integrity data of one stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub kind: ValueKind,
    pub compression: Compression,
    /// Absolute file offset of the stored payload.
    pub offset: u64,
    /// Stored (possibly compressed) length in bytes.
    pub length: u64,
    /// Uncompressed length in bytes.
    pub raw_length: u64,
    pub crc32: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RecordIndex {
    pub format_version: u32,
    pub entries: Vec<IndexEntry>,
}
