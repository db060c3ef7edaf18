//! Node-column function space: fields on the nodes of a partitioned mesh and
//! the collectives that move them between ranks.
//!
//! Global fields live on a single owner rank (the coordinator) and hold one
//! value per grid point; on every other rank they are empty. Local fields hold
//! one value per local node, owned nodes first.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, instrument};

use crate::comm::{check_rank, decode_f64s_into, encode_f64s};
use crate::{Communicator, Field, FieldSet, Mesh, MeshError, MeshResult, Tag};

pub struct NodeColumns<'c, C: Communicator> {
    mesh: Mesh,
    comm: &'c C,
    coordinator: usize,
}

impl<'c, C: Communicator> NodeColumns<'c, C> {
    /// Function space over `mesh` with global fields owned by rank 0.
    pub fn new(mesh: Mesh, comm: &'c C) -> MeshResult<Self> {
        if mesh.partition().parts() != comm.size() || mesh.rank() != comm.rank() {
            return Err(MeshError::Comm(format!(
                "mesh of rank {}/{} used with communicator rank {}/{}",
                mesh.rank(),
                mesh.partition().parts(),
                comm.rank(),
                comm.size()
            )));
        }
        Ok(Self {
            mesh,
            comm,
            coordinator: 0,
        })
    }

    /// Own global fields on `coordinator` instead of rank 0.
    pub fn with_coordinator(mut self, coordinator: usize) -> MeshResult<Self> {
        check_rank(coordinator, self.comm.size())?;
        self.coordinator = coordinator;
        Ok(self)
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn comm(&self) -> &'c C {
        self.comm
    }

    pub fn coordinator(&self) -> usize {
        self.coordinator
    }

    pub fn is_coordinator(&self) -> bool {
        self.comm.rank() == self.coordinator
    }

    /// A zero-initialized local field.
    pub fn create_field(&self, name: impl Into<String>) -> Field {
        Field::new(name, self.mesh.local_size())
    }

    /// A zero-initialized global counterpart of `local`: the full grid on the
    /// coordinator, empty elsewhere.
    pub fn create_global_field(&self, local: &Field) -> Field {
        let len = if self.is_coordinator() {
            self.mesh.grid().size()
        } else {
            0
        };
        Field::new(local.name(), len)
    }

    /// Distribute a global field from the coordinator into the owned nodes of
    /// `local` on every rank. Halo values are left untouched.
    #[instrument(skip_all, fields(field = %local.name(), rank = self.comm.rank()))]
    pub fn scatter(&self, global: &Field, local: &mut Field) -> MeshResult<()> {
        self.check_local(local)?;
        let partition = self.mesh.partition();
        let owned = self.mesh.owned_size();

        if self.is_coordinator() {
            self.check_global(global)?;
            for rank in (0..self.comm.size()).filter(|r| *r != self.coordinator) {
                let payload = encode_f64s(&global.values()[partition.range(rank)]);
                self.comm.send(rank, Tag::Scatter, payload)?;
            }
            let own = partition.range(self.coordinator);
            local.values_mut()[..owned].copy_from_slice(&global.values()[own]);
        } else {
            let payload = self.comm.recv(self.coordinator, Tag::Scatter)?;
            let name = local.name().to_string();
            decode_f64s_into(payload, &mut local.values_mut()[..owned], &name)?;
        }

        debug!(owned, "Scattered field");
        Ok(())
    }

    /// Collect the owned nodes of `local` from every rank into the global
    /// field on the coordinator.
    #[instrument(skip_all, fields(field = %local.name(), rank = self.comm.rank()))]
    pub fn gather(&self, local: &Field, global: &mut Field) -> MeshResult<()> {
        self.check_local(local)?;
        let partition = self.mesh.partition();
        let owned = self.mesh.owned_size();

        if self.is_coordinator() {
            self.check_global(global)?;
            let own = partition.range(self.coordinator);
            global.values_mut()[own].copy_from_slice(&local.values()[..owned]);
            for rank in (0..self.comm.size()).filter(|r| *r != self.coordinator) {
                let payload = self.comm.recv(rank, Tag::Gather)?;
                let range = partition.range(rank);
                decode_f64s_into(payload, &mut global.values_mut()[range], local.name())?;
            }
        } else {
            let payload = encode_f64s(&local.values()[..owned]);
            self.comm.send(self.coordinator, Tag::Gather, payload)?;
        }

        debug!(owned, "Gathered field");
        Ok(())
    }

    /// Refresh the halo values of every field in `fields` from their owners.
    ///
    /// One message per peer carries all fields; the field count travels with
    /// it and a disagreement between ranks is an error.
    #[instrument(skip_all, fields(fields = fields.len(), rank = self.comm.rank()))]
    pub fn halo_exchange(&self, fields: &mut FieldSet) -> MeshResult<()> {
        for field in fields.iter() {
            self.check_local(field)?;
        }
        let nfields = fields.len();

        for (peer, list) in self.mesh.send_lists() {
            let mut buf = BytesMut::with_capacity(8 + nfields * list.len() * 8);
            buf.put_u64_le(nfields as u64);
            for field in fields.iter() {
                for i in list {
                    buf.put_f64_le(field.values()[*i]);
                }
            }
            self.comm.send(*peer, Tag::Halo, buf.freeze())?;
        }

        for (peer, list) in self.mesh.recv_lists() {
            let mut payload: Bytes = self.comm.recv(*peer, Tag::Halo)?;
            if payload.len() < 8 {
                return Err(MeshError::Comm(format!(
                    "halo message from rank {} has no header",
                    peer
                )));
            }
            let remote = payload.get_u64_le() as usize;
            if remote != nfields {
                return Err(MeshError::FieldCountMismatch {
                    peer: *peer,
                    local: nfields,
                    remote,
                });
            }
            if payload.len() != nfields * list.len() * 8 {
                return Err(MeshError::SizeMismatch {
                    what: format!("halo from rank {}", peer),
                    expected: nfields * list.len(),
                    found: payload.len() / 8,
                });
            }
            for field in fields.iter_mut() {
                let values = field.values_mut();
                for i in list {
                    values[*i] = payload.get_f64_le();
                }
            }
        }

        debug!(
            peers = self.mesh.send_lists().len(),
            halo = self.mesh.halo_size(),
            "Exchanged halos"
        );
        Ok(())
    }

    fn check_local(&self, field: &Field) -> MeshResult<()> {
        if field.len() != self.mesh.local_size() {
            return Err(MeshError::SizeMismatch {
                what: format!("local field {}", field.name()),
                expected: self.mesh.local_size(),
                found: field.len(),
            });
        }
        Ok(())
    }

    fn check_global(&self, field: &Field) -> MeshResult<()> {
        if field.len() != self.mesh.grid().size() {
            return Err(MeshError::SizeMismatch {
                what: format!("global field {}", field.name()),
                expected: self.mesh.grid().size(),
                found: field.len(),
            });
        }
        Ok(())
    }
}
