//! Error types for GRIB2 decoding.

use thiserror::Error;

/// Errors that can occur while reading or decoding GRIB2 data.
#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported GRIB edition {0}, only edition 2 is supported")]
    UnsupportedEdition(u8),

    #[error("Unsupported data representation template 5.{0}")]
    UnsupportedPacking(u16),

    #[error("Failed to unpack data: {0}")]
    UnpackingError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key '{key}' cannot be read as {expected}")]
    WrongKeyType { key: String, expected: &'static str },
}
