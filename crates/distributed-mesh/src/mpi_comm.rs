//! MPI-backed communicator, one rank per process.
//!
//! Launch the program with `mpirun -n <ranks>`; every process calls
//! [`MpiComm::initialize`] once and drops the communicator before exiting,
//! which finalizes MPI.

use bytes::Bytes;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as _, Destination, Root, Source};
use tracing::{debug, trace};

use crate::comm::check_rank;
use crate::{Communicator, MeshError, MeshResult, Tag};

pub struct MpiComm {
    world: SimpleCommunicator,
    // Dropped last: finalizes MPI
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI and wrap the world communicator.
    pub fn initialize() -> MeshResult<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| MeshError::Comm("MPI has already been initialized".to_string()))?;
        let world = universe.world();
        debug!(rank = world.rank(), size = world.size(), "Initialized MPI");
        Ok(Self {
            world,
            _universe: universe,
        })
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) -> MeshResult<()> {
        self.world.barrier();
        Ok(())
    }

    fn send(&self, dest: usize, tag: Tag, payload: Bytes) -> MeshResult<()> {
        check_rank(dest, self.size())?;
        trace!(rank = self.rank(), dest, ?tag, bytes = payload.len(), "send");
        self.world
            .process_at_rank(dest as i32)
            .send_with_tag(&payload[..], tag.code());
        Ok(())
    }

    fn recv(&self, source: usize, tag: Tag) -> MeshResult<Bytes> {
        check_rank(source, self.size())?;
        // Any tag: a message from the wrong collective is reported, not left queued
        let (data, status) = self
            .world
            .process_at_rank(source as i32)
            .receive_vec::<u8>();
        let found = Tag::from_code(status.tag()).ok_or_else(|| {
            MeshError::Comm(format!(
                "unknown message tag {} from rank {}",
                status.tag(),
                source
            ))
        })?;
        if found != tag {
            return Err(MeshError::TagMismatch {
                peer: source,
                expected: tag,
                found,
            });
        }
        trace!(rank = self.rank(), source, ?tag, bytes = data.len(), "recv");
        Ok(Bytes::from(data))
    }

    fn broadcast(&self, root: usize, payload: Bytes) -> MeshResult<Bytes> {
        check_rank(root, self.size())?;
        let root_process = self.world.process_at_rank(root as i32);
        let is_root = self.rank() == root;

        let mut len = payload.len() as u64;
        root_process.broadcast_into(&mut len);

        let mut buf = if is_root {
            payload.to_vec()
        } else {
            vec![0u8; len as usize]
        };
        root_process.broadcast_into(&mut buf[..]);
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // MPI can be initialized once per process, so everything runs in one test.
    #[test]
    fn test_singleton_world() {
        let comm = MpiComm::initialize().unwrap();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        comm.barrier().unwrap();

        let out = comm.broadcast(0, Bytes::from_static(b"grid")).unwrap();
        assert_eq!(&out[..], b"grid");
        assert!(comm.broadcast_flag(0, true).unwrap());
        assert!(matches!(
            comm.send(1, Tag::Halo, Bytes::new()),
            Err(MeshError::InvalidRank { rank: 1, size: 1 })
        ));

        assert!(MpiComm::initialize().is_err());
    }
}
