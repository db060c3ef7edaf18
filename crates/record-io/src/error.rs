//! Error types for record container I/O.

use thiserror::Error;

use crate::ValueKind;

/// Errors that can occur while writing or reading a record container.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Underlying file I/O failed.
    #[error("record I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a record container or its framing is damaged.
    #[error("corrupt record container: {0}")]
    Corrupt(String),

    /// The index at the end of the file could not be decoded.
    #[error("invalid record index: {0}")]
    Index(#[from] serde_json::Error),

    /// No record is stored under the key.
    #[error("record not found: {0}")]
    KeyNotFound(String),

    /// The stored value has a different type than requested.
    #[error("record {key} holds {found:?}, expected {expected:?}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// The stored bytes do not match the recorded checksum.
    #[error("checksum mismatch for record {key}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        key: String,
        stored: u32,
        computed: u32,
    },

    /// A destination buffer does not have the stored array length.
    #[error("record {key} holds {stored} values, buffer has {provided}")]
    LengthMismatch {
        key: String,
        stored: usize,
        provided: usize,
    },

    /// Compressing or decompressing a record failed.
    #[error("compression error: {0}")]
    Compression(String),
}

/// Result alias for record container operations.
pub type RecordResult<T> = Result<T, RecordError>;
