//! Error types for grids, meshes and collectives.

use thiserror::Error;

/// Errors that can occur while building a mesh or exchanging field data.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The grid identifier does not name a supported grid.
    #[error("cannot resolve grid '{0}'")]
    GridResolution(String),

    /// A rank argument is outside the communicator.
    #[error("rank {rank} is out of range for {size} ranks")]
    InvalidRank { rank: usize, size: usize },

    /// A peer hung up before the collective completed.
    #[error("rank {peer} disconnected")]
    Disconnected { peer: usize },

    /// A message arrived out of collective order.
    #[error("expected {expected:?} from rank {peer}, received {found:?}")]
    TagMismatch {
        peer: usize,
        expected: crate::Tag,
        found: crate::Tag,
    },

    /// Ranks disagree on the number of fields in a halo exchange.
    #[error("halo exchange with rank {peer}: {local} local fields, {remote} remote fields")]
    FieldCountMismatch {
        peer: usize,
        local: usize,
        remote: usize,
    },

    /// An array does not have the length the mesh requires.
    #[error("{what}: expected {expected} values, got {found}")]
    SizeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    /// The communicator cannot perform the operation.
    #[error("communicator error: {0}")]
    Comm(String),

    /// Writing visualization output failed.
    #[error("mesh output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
