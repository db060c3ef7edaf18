//! The full conversion as run by each rank.

use std::path::PathBuf;

use distributed_mesh::{Communicator, Coordinates, GmshWriter};
use record_io::{RecordReader, RecordWriter};
use tracing::{info, info_span};

use crate::config::ConversionConfig;
use crate::coordinator::run_on_coordinator;
use crate::error::Result;
use crate::exporter::{ExportSummary, RecordExporter};
use crate::loader::DistributedFieldLoader;
use crate::stream::MessageStream;

/// Gmsh output settings.
#[derive(Debug, Clone)]
pub struct GmshOutput {
    pub path: PathBuf,
    pub coordinates: Coordinates,
}

/// Inputs and outputs of one conversion.
#[derive(Debug, Clone)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub gmsh: Option<GmshOutput>,
    pub config: ConversionConfig,
}

/// What a rank did.
#[derive(Debug, Clone, Default)]
pub struct RankReport {
    /// Set on the coordinator only.
    pub export: Option<ExportSummary>,
    /// Names of the fields loaded for Gmsh output.
    pub loaded_fields: Vec<String>,
}

/// Export on the coordinator, then optionally load the container on every
/// rank and write Gmsh output from the coordinator.
pub fn run<C: Communicator>(job: &ConvertJob, comm: &C) -> Result<RankReport> {
    let coordinator = job.config.coordinator;
    let span = info_span!("rank", rank = comm.rank(), coordinator);
    let _guard = span.enter();

    let export = run_on_coordinator(comm, coordinator, || {
        let mut stream = MessageStream::open(&job.input)?;
        let mut writer =
            RecordWriter::new(&job.output).with_array_compression(job.config.compression);
        RecordExporter::new(job.config.compression).export(&mut stream, &mut writer)
    })?;

    if let Some(summary) = &export {
        info!(
            grid.name = %summary.grid_name,
            grid.size = summary.grid_size,
            fields = summary.fields.len(),
            output = %job.output.display(),
            "Export complete"
        );
    }

    let mut report = RankReport {
        export,
        loaded_fields: Vec::new(),
    };

    let Some(gmsh) = &job.gmsh else {
        return Ok(report);
    };

    info!(path = %gmsh.path.display(), coordinates = %gmsh.coordinates, "Output to gmsh file");
    let reader = RecordReader::open(&job.output)?;
    let loader = DistributedFieldLoader::new(&reader, comm, coordinator)?;
    let writer = GmshWriter::new(&gmsh.path, gmsh.coordinates);

    run_on_coordinator(comm, coordinator, || {
        Ok(writer.write_mesh(loader.function_space().mesh().grid())?)
    })?;

    let loaded = loader.load_all()?;
    let globals = loaded.gather()?;
    let grid = loaded.function_space().mesh().grid();
    run_on_coordinator(comm, coordinator, || {
        Ok(writer.write_fields(grid, &globals)?)
    })?;

    report.loaded_fields = loaded
        .fields()
        .names()
        .into_iter()
        .map(String::from)
        .collect();
    Ok(report)
}
