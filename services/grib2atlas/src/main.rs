//! GRIB2 to record container converter.
//!
//! Exports every message of a GRIB2 file into a record container and can
//! read the container back onto a partitioned mesh to write Gmsh output.
//!
//! Built with the `mpi` feature, every process started by `mpirun` is one
//! rank; otherwise the conversion runs on a single rank.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use conversion::{run, ConversionConfig, ConvertJob, GmshOutput};
#[cfg(feature = "mpi")]
use distributed_mesh::MpiComm;
#[cfg(not(feature = "mpi"))]
use distributed_mesh::SerialComm;
use distributed_mesh::{Communicator, Coordinates};
use record_io::Compression;

#[derive(Parser, Debug)]
#[command(name = "grib2atlas")]
#[command(about = "Convert a GRIB2 file into a record container")]
struct Args {
    /// Input GRIB2 file
    #[arg(default_value = "in.grib")]
    input: String,

    /// Output record container
    #[arg(short, long, default_value = "out.atlas")]
    output: String,

    /// Also write a Gmsh file with the mesh and every field
    #[arg(long, num_args = 0..=1, default_missing_value = "out.msh")]
    gmsh: Option<String>,

    /// Node coordinates in the Gmsh file (xy, lonlat, xyz)
    #[arg(long, default_value = "xy", value_parser = parse_coordinates)]
    coordinates: Coordinates,

    /// Rank that reads the input and writes output files
    #[arg(long)]
    coordinator: Option<usize>,

    /// Compression of stored arrays (none, deflate)
    #[arg(long, value_parser = parse_compression)]
    compression: Option<Compression>,

    /// Log level
    #[arg(long, env = "GRIB2ATLAS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn parse_coordinates(s: &str) -> std::result::Result<Coordinates, String> {
    Coordinates::parse(s).ok_or_else(|| format!("unknown coordinates '{}'", s))
}

fn parse_compression(s: &str) -> std::result::Result<Compression, String> {
    Compression::parse(s).ok_or_else(|| format!("unknown compression '{}'", s))
}

impl Args {
    /// Environment configuration overridden by command line flags, checked
    /// against the number of ranks.
    fn config(&self, ranks: usize) -> Result<ConversionConfig> {
        let mut config = ConversionConfig::from_env();
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if let Some(coordinator) = self.coordinator {
            config.coordinator = coordinator;
        }
        config
            .validate(ranks)
            .map_err(|e| anyhow!("invalid configuration: {}", e))?;
        Ok(config)
    }

    fn job(&self, ranks: usize) -> Result<ConvertJob> {
        Ok(ConvertJob {
            input: self.input.clone().into(),
            output: self.output.clone().into(),
            gmsh: self.gmsh.as_ref().map(|path| GmshOutput {
                path: path.into(),
                coordinates: self.coordinates,
            }),
            config: self.config(ranks)?,
        })
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    if std::env::var_os("GRIB2ATLAS_LOG_JSON").is_some() {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[cfg(feature = "mpi")]
fn communicator() -> Result<MpiComm> {
    Ok(MpiComm::initialize()?)
}

#[cfg(not(feature = "mpi"))]
fn communicator() -> Result<SerialComm> {
    Ok(SerialComm)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let comm = communicator()?;
    let job = args.job(comm.size())?;
    info!(
        rank = comm.rank(),
        ranks = comm.size(),
        input = %job.input.display(),
        output = %job.output.display(),
        config = %serde_json::to_string(&job.config)?,
        "Starting grib2atlas"
    );

    // Each rank reports its own outcome; only the coordinator holds the cause
    let report = run(&job, &comm)
        .map_err(|e| {
            error!(rank = comm.rank(), error = %e, "Conversion failed");
            e
        })
        .with_context(|| format!("failed to convert {}", job.input.display()))?;

    if let (Some(gmsh), Some(_)) = (&job.gmsh, &report.export) {
        info!(
            path = %gmsh.path.display(),
            fields = report.loaded_fields.len(),
            "Wrote gmsh output"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["grib2atlas"]).unwrap();
        assert_eq!(args.input, "in.grib");
        assert_eq!(args.output, "out.atlas");
        assert_eq!(args.gmsh, None);
        assert_eq!(args.coordinates, Coordinates::Xy);
    }

    #[test]
    fn test_gmsh_path_is_optional() {
        let args = Args::try_parse_from(["grib2atlas", "data.grib2", "--gmsh"]).unwrap();
        assert_eq!(args.input, "data.grib2");
        assert_eq!(args.gmsh.as_deref(), Some("out.msh"));

        let args =
            Args::try_parse_from(["grib2atlas", "--gmsh", "mesh.msh", "-o", "x.atlas"]).unwrap();
        assert_eq!(args.gmsh.as_deref(), Some("mesh.msh"));
        assert_eq!(args.output, "x.atlas");
    }

    #[test]
    fn test_rejects_unknown_flags_and_values() {
        assert!(Args::try_parse_from(["grib2atlas", "--bogus"]).is_err());
        assert!(Args::try_parse_from(["grib2atlas", "--ranks", "4"]).is_err());
        assert!(Args::try_parse_from(["grib2atlas", "--coordinates", "polar"]).is_err());
        assert!(Args::try_parse_from(["grib2atlas", "--compression", "lz4"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "grib2atlas",
            "--coordinator",
            "3",
            "--compression",
            "none",
            "--coordinates",
            "xyz",
            "--gmsh",
        ])
        .unwrap();
        let job = args.job(4).unwrap();
        assert_eq!(job.config.coordinator, 3);
        assert_eq!(job.config.compression, Compression::None);
        assert_eq!(job.gmsh.unwrap().coordinates, Coordinates::Xyz);
    }

    #[test]
    fn test_invalid_coordinator_is_rejected() {
        let args = Args::try_parse_from(["grib2atlas", "--coordinator", "2"]).unwrap();
        assert!(args.job(2).is_err());
        assert!(args.job(3).is_ok());
    }
}
