//! Record container writer.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::format::{
    Compression, IndexEntry, RecordIndex, FORMAT_VERSION, HEADER_MAGIC, TRAILER_MAGIC,
};
use crate::{RecordResult, RecordValue};

/// Collects records in memory and writes them to `path` on [`write`](Self::write).
///
/// Setting a key twice replaces the earlier value but keeps its position.
pub struct RecordWriter {
    path: PathBuf,
    default_array_compression: Compression,
    records: Vec<(String, RecordValue, Compression)>,
    positions: HashMap<String, usize>,
}

impl RecordWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_array_compression: Compression::None,
            records: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Compression used for array values stored with [`set`](Self::set).
    /// Strings and integers are always stored uncompressed.
    pub fn with_array_compression(mut self, compression: Compression) -> Self {
        self.default_array_compression = compression;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a value using the writer's default compression.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<RecordValue>) {
        let value = value.into();
        let compression = match value {
            RecordValue::Doubles(_) => self.default_array_compression,
            _ => Compression::None,
        };
        self.set_with_compression(key, value, compression);
    }

    /// Store a value with an explicit compression setting.
    pub fn set_with_compression(
        &mut self,
        key: impl Into<String>,
        value: impl Into<RecordValue>,
        compression: Compression,
    ) {
        let key = key.into();
        let value = value.into();
        match self.positions.get(&key) {
            Some(&i) => self.records[i] = (key, value, compression),
            None => {
                self.positions.insert(key.clone(), self.records.len());
                self.records.push((key, value, compression));
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write all records to the target path, replacing any existing file.
    pub fn write(&self) -> RecordResult<()> {
        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);

        out.write_all(HEADER_MAGIC)?;
        let mut offset = HEADER_MAGIC.len() as u64;
        let mut entries = Vec::with_capacity(self.records.len());

        for (key, value, compression) in &self.records {
            let raw = value.encode();
            let stored = compression.compress(&raw)?;
            out.write_all(&stored)?;

            debug!(
                key = %key,
                kind = ?value.kind(),
                compression = %compression,
                raw_bytes = raw.len(),
                stored_bytes = stored.len(),
                "Wrote record"
            );

            entries.push(IndexEntry {
                key: key.clone(),
                kind: value.kind(),
                compression: *compression,
                offset,
                length: stored.len() as u64,
                raw_length: raw.len() as u64,
                crc32: crc32fast::hash(&raw),
            });
            offset += stored.len() as u64;
        }

        let index = serde_json::to_vec(&RecordIndex {
            format_version: FORMAT_VERSION,
            entries,
        })?;
        out.write_all(&index)?;
        out.write_all(&(index.len() as u64).to_le_bytes())?;
        out.write_all(TRAILER_MAGIC)?;
        out.flush()?;

        info!(
            path = %self.path.display(),
            records = self.records.len(),
            bytes = offset + index.len() as u64 + 16,
            "Wrote record container"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut writer = RecordWriter::new("unused.atlas");
        writer.set("a", 1i64);
        writer.set("b", "x");
        writer.set("a", 2i64);

        assert_eq!(writer.len(), 2);
        assert_eq!(writer.records[0].1, RecordValue::Integer(2));
        assert!(writer.contains("b"));
    }

    #[test]
    fn test_default_compression_only_for_arrays() {
        let mut writer =
            RecordWriter::new("unused.atlas").with_array_compression(Compression::Deflate);
        writer.set("name", "t");
        writer.set("array", vec![1.0, 2.0]);

        assert_eq!(writer.records[0].2, Compression::None);
        assert_eq!(writer.records[1].2, Compression::Deflate);
    }
}
