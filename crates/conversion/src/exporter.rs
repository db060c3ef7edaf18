//! Export of a GRIB2 message stream into a record container.
//!
//! Layout of the written records:
//!
//! ```text
//! grid.name            string   grid identifier of the first message
//! grid.pl              integers points per latitude (reduced grids only)
//! fields.size          integer  number of messages
//! fields[i].name       string   shortName of message i+1
//! fields[i].description string  name of message i+1
//! fields[i].level      integer  level of message i+1
//! fields[i].array      doubles  values of message i+1
//! ```

use record_io::{Compression, RecordWriter};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{ConversionError, Result};
use crate::namer::grid_name_for;
use crate::stream::MessageStream;

/// Key prefix of the records of field `index`.
pub fn field_prefix(index: usize) -> String {
    format!("fields[{}]", index)
}

/// One exported field, as logged and returned in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub level: i64,
    pub size: usize,
}

/// What an export wrote.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub grid_name: String,
    pub grid_size: usize,
    pub fields: Vec<FieldSummary>,
}

/// Copies every message of a stream into a record writer.
///
/// The values buffer is reused from message to message; each stored array is
/// a copy of it.
pub struct RecordExporter {
    compression: Compression,
    buffer: Vec<f64>,
}

impl RecordExporter {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            buffer: Vec::new(),
        }
    }

    /// Populate `writer` with every message of `stream` and write the
    /// container to the writer's path.
    ///
    /// The stream must still be at its first message, so that `fields[i]`
    /// is message `i + 1` and the grid is named after the first message.
    #[instrument(skip_all, fields(input = %stream.path().display(), output = %writer.path().display()))]
    pub fn export(
        &mut self,
        stream: &mut MessageStream,
        writer: &mut RecordWriter,
    ) -> Result<ExportSummary> {
        if stream.ordinal() != 1 {
            return Err(ConversionError::Format(format!(
                "{}: export must start at message 1, stream is at message {}",
                stream.path().display(),
                stream.ordinal()
            )));
        }
        let grid_name = grid_name_for(stream)?;
        let grid_size = stream.current_values_size();
        let count = stream.count();

        writer.set_with_compression("grid.name", grid_name.as_str(), self.compression);
        let rows = stream.current_points_per_row()?;
        if !rows.is_empty() {
            writer.set("grid.pl", rows.iter().map(|p| *p as i64).collect::<Vec<_>>());
        }
        writer.set("fields.size", count as i64);
        info!(grid.name = %grid_name, grid.size = grid_size, fields = count, "Exporting fields");

        let mut fields = Vec::with_capacity(count);
        for index in 0..count {
            let size = stream.current_values_size();
            if self.buffer.len() < size {
                self.buffer.resize(size, 0.0);
            }
            let written = stream.current_values_into(&mut self.buffer)?;

            let summary = FieldSummary {
                index,
                name: stream.current_string("shortName")?,
                description: stream.current_string("name")?,
                level: stream.current_long("level")?,
                size: written,
            };

            let prefix = field_prefix(index);
            writer.set(format!("{}.name", prefix), summary.name.as_str());
            writer.set(format!("{}.description", prefix), summary.description.as_str());
            writer.set(format!("{}.level", prefix), summary.level);
            writer.set_with_compression(
                format!("{}.array", prefix),
                &self.buffer[..written],
                self.compression,
            );

            info!(
                index,
                field = %summary.name,
                level = summary.level,
                description = %summary.description,
                "Exported field"
            );
            fields.push(summary);

            if index + 1 < count && !stream.advance()? {
                return Err(ConversionError::Format(format!(
                    "{}: stream ended after {} of {} messages",
                    stream.path().display(),
                    index + 1,
                    count
                )));
            }
        }

        writer.write()?;

        Ok(ExportSummary {
            grid_name,
            grid_size,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_prefix() {
        assert_eq!(field_prefix(0), "fields[0]");
        assert_eq!(field_prefix(12), "fields[12]");
    }
}
