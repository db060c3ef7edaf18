//! Distributed meshes for global Gaussian grids.
//!
//! - [`Grid`]: grids built from identifiers such as `O1280` or `F128`, and
//!   classic grids such as `N640` from their row lengths
//! - [`Mesh`]: one rank's partition of a grid with its halo
//! - [`NodeColumns`]: node fields with scatter, gather and halo exchange
//! - [`Communicator`]: the message-passing layer, with [`SerialComm`] for a
//!   single process, `MpiComm` for one rank per MPI process (feature
//!   `mpi-support`) and [`ThreadComm`] for ranks on threads in tests
//! - [`GmshWriter`]: Gmsh output for visual inspection

pub mod comm;
pub mod error;
pub mod field;
pub mod functionspace;
pub mod gmsh;
pub mod grid;
pub mod mesh;
#[cfg(feature = "mpi-support")]
pub mod mpi_comm;

pub use comm::{Communicator, SerialComm, Tag, ThreadComm};
pub use error::{MeshError, MeshResult};
pub use field::{Field, FieldSet};
pub use functionspace::NodeColumns;
pub use gmsh::{Coordinates, GmshWriter};
pub use grid::{Grid, GridFamily};
pub use mesh::{Mesh, Partition};
#[cfg(feature = "mpi-support")]
pub use mpi_comm::MpiComm;
