//! GRIB2 to record container conversion.
//!
//! The pipeline reads a multi-message GRIB2 file with [`MessageStream`],
//! names its grid with [`grid_name`], writes every message as a field group
//! with [`RecordExporter`], and can read the container back onto a
//! partitioned mesh with [`DistributedFieldLoader`].
//!
//! # Example
//!
//! ```no_run
//! use conversion::{MessageStream, RecordExporter};
//! use record_io::{Compression, RecordWriter};
//!
//! let mut stream = MessageStream::open("in.grib")?;
//! let mut writer = RecordWriter::new("out.atlas");
//! let summary = RecordExporter::new(Compression::None).export(&mut stream, &mut writer)?;
//! println!("{} fields on {}", summary.fields.len(), summary.grid_name);
//! # Ok::<(), conversion::ConversionError>(())
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod exporter;
pub mod loader;
pub mod namer;
pub mod pipeline;
pub mod stream;

pub use config::ConversionConfig;
pub use coordinator::run_on_coordinator;
pub use error::{ConversionError, Result};
pub use exporter::{ExportSummary, FieldSummary, RecordExporter};
pub use loader::{DistributedFieldLoader, IngestedField, LoadedFields};
pub use namer::{grid_name, grid_name_for};
pub use pipeline::{run, ConvertJob, GmshOutput, RankReport};
pub use stream::{DecodedMessage, MessageStream, Messages};
