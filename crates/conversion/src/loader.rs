//! Distributed loading of exported fields onto a partitioned mesh.
//!
//! Loading runs in three phases, each a different type:
//!
//! 1. [`DistributedFieldLoader::ingest`] creates a field and, on the
//!    coordinator only, reads its global array ([`IngestedField`]).
//! 2. [`DistributedFieldLoader::distribute`] scatters an ingested field to
//!    every rank and keeps the local part.
//! 3. [`DistributedFieldLoader::synchronize`] consumes the loader, exchanges
//!    the halos of all fields at once and returns the [`LoadedFields`].
//!
//! Every rank must run the same phases for the same fields in the same order.

use distributed_mesh::{Communicator, Field, FieldSet, Grid, Mesh, NodeColumns};
use record_io::RecordReader;
use tracing::{debug, info, instrument};

use crate::error::{ConversionError, Result};
use crate::exporter::field_prefix;

/// A field whose global values have been read on the coordinator.
pub struct IngestedField {
    local: Field,
    global: Field,
}

impl IngestedField {
    pub fn name(&self) -> &str {
        self.local.name()
    }
}

pub struct DistributedFieldLoader<'r, 'c, C: Communicator> {
    reader: &'r RecordReader,
    function_space: NodeColumns<'c, C>,
    grid_name: String,
    field_count: usize,
    fields: FieldSet,
}

impl<'r, 'c, C: Communicator> DistributedFieldLoader<'r, 'c, C> {
    /// Build the mesh named by `grid.name`, with the row lengths of
    /// `grid.pl` when present, and read `fields.size`.
    pub fn new(reader: &'r RecordReader, comm: &'c C, coordinator: usize) -> Result<Self> {
        let grid_name = reader.read_string("grid.name")?;
        let grid = if reader.contains("grid.pl") {
            let rows = reader
                .read_integers("grid.pl")?
                .into_iter()
                .map(|p| {
                    usize::try_from(p).map_err(|_| {
                        ConversionError::Format(format!("grid.pl has a negative row length {}", p))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Grid::from_name_with_rows(&grid_name, &rows)?
        } else {
            Grid::from_name(&grid_name)?
        };
        let mesh = Mesh::new(grid, comm.rank(), comm.size())?;
        let function_space = NodeColumns::new(mesh, comm)?.with_coordinator(coordinator)?;

        let stored = reader.read_integer("fields.size")?;
        let field_count = usize::try_from(stored).map_err(|_| {
            ConversionError::Format(format!("fields.size is negative: {}", stored))
        })?;

        debug!(
            grid = %grid_name,
            rank = comm.rank(),
            local_nodes = function_space.mesh().local_size(),
            fields = field_count,
            "Prepared distributed loading"
        );

        Ok(Self {
            reader,
            function_space,
            grid_name,
            field_count,
            fields: FieldSet::new(),
        })
    }

    pub fn grid_name(&self) -> &str {
        &self.grid_name
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn function_space(&self) -> &NodeColumns<'c, C> {
        &self.function_space
    }

    /// Phase 1: create field `index` as `name[level]` and read its global
    /// values on the coordinator.
    pub fn ingest(&self, index: usize) -> Result<IngestedField> {
        if index >= self.field_count {
            return Err(ConversionError::MissingKey(format!(
                "{} (fields.size is {})",
                field_prefix(index),
                self.field_count
            )));
        }
        let prefix = field_prefix(index);
        let level = self.reader.read_integer(&format!("{}.level", prefix))?;
        let name = self.reader.read_string(&format!("{}.name", prefix))?;

        let local = self.function_space.create_field(format!("{}[{}]", name, level));
        let mut global = self.function_space.create_global_field(&local);

        if self.function_space.is_coordinator() {
            let key = format!("{}.array", prefix);
            let stored = self.reader.doubles_len(&key)?;
            if stored != global.len() {
                return Err(ConversionError::SizeMismatch {
                    field: local.name().to_string(),
                    grid: self.grid_name.clone(),
                    expected: global.len(),
                    found: stored,
                });
            }
            self.reader.read_doubles_into(&key, global.values_mut())?;
        }

        Ok(IngestedField { local, global })
    }

    /// Phase 2: scatter an ingested field from the coordinator; the global
    /// copy is released afterwards.
    #[instrument(skip_all, fields(field = %ingested.name()))]
    pub fn distribute(&mut self, ingested: IngestedField) -> Result<()> {
        let IngestedField { mut local, global } = ingested;
        self.function_space.scatter(&global, &mut local)?;
        self.fields.add(local);
        Ok(())
    }

    /// Phase 3: exchange halos of every distributed field.
    pub fn synchronize(mut self) -> Result<LoadedFields<'c, C>> {
        self.function_space.halo_exchange(&mut self.fields)?;
        info!(
            grid = %self.grid_name,
            fields = self.fields.len(),
            rank = self.function_space.comm().rank(),
            "Loaded distributed fields"
        );
        Ok(LoadedFields {
            grid_name: self.grid_name,
            function_space: self.function_space,
            fields: self.fields,
        })
    }

    /// Ingest and distribute every stored field, then synchronize.
    pub fn load_all(mut self) -> Result<LoadedFields<'c, C>> {
        for index in 0..self.field_count {
            let ingested = self.ingest(index)?;
            self.distribute(ingested)?;
        }
        self.synchronize()
    }
}

/// Fields distributed over the mesh with up-to-date halos.
pub struct LoadedFields<'c, C: Communicator> {
    grid_name: String,
    function_space: NodeColumns<'c, C>,
    fields: FieldSet,
}

impl<'c, C: Communicator> LoadedFields<'c, C> {
    pub fn grid_name(&self) -> &str {
        &self.grid_name
    }

    pub fn function_space(&self) -> &NodeColumns<'c, C> {
        &self.function_space
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Gather every field to the coordinator. Global fields are empty on the
    /// other ranks.
    pub fn gather(&self) -> Result<Vec<Field>> {
        self.fields
            .iter()
            .map(|local| {
                let mut global = self.function_space.create_global_field(local);
                self.function_space.gather(local, &mut global)?;
                Ok(global)
            })
            .collect()
    }
}
