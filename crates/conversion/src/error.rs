//! Error types for the conversion pipeline.

use std::path::PathBuf;

use distributed_mesh::MeshError;
use grib2_parser::Grib2Error;
use record_io::RecordError;
use thiserror::Error;

/// Errors that can occur while converting or loading fields.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The input file is missing or unreadable.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A GRIB message could not be decoded.
    #[error("GRIB format error: {0}")]
    Format(String),

    /// The caller's buffer cannot hold the current message's values.
    #[error("buffer holds {provided} values, message has {required}")]
    BufferTooSmall { required: usize, provided: usize },

    /// The current message has no such key.
    #[error("message has no key '{0}'")]
    MissingKey(String),

    /// The stored grid identifier cannot be turned into a mesh.
    #[error("cannot resolve grid '{0}'")]
    GridResolution(String),

    /// A stored array does not match the grid size.
    #[error("field {field} has {found} values, grid {grid} has {expected}")]
    SizeMismatch {
        field: String,
        grid: String,
        expected: usize,
        found: usize,
    },

    /// The designated coordinator reported a failure to the other ranks.
    #[error("coordinator rank {0} failed")]
    CoordinatorFailed(usize),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Mesh(MeshError),
}

impl ConversionError {
    /// Attach the path to a GRIB decoding error.
    pub(crate) fn from_grib(path: &std::path::Path, err: Grib2Error) -> Self {
        match err {
            Grib2Error::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            Grib2Error::KeyNotFound(key) => Self::MissingKey(key),
            other => Self::Format(format!("{}: {}", path.display(), other)),
        }
    }
}

impl From<MeshError> for ConversionError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::GridResolution(name) => Self::GridResolution(name),
            other => Self::Mesh(other),
        }
    }
}

/// Result alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;
