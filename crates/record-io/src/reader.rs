//! Record container reader.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;

use crate::format::{IndexEntry, RecordIndex, HEADER_MAGIC, TRAILER_LEN, TRAILER_MAGIC};
use crate::value::{decode_doubles_into, doubles_len};
use crate::{RecordError, RecordResult, RecordValue, ValueKind};

/// Read-only view of a record container.
///
/// Only the index is loaded on [`open`](Self::open). Each record is read from
/// the file when it is accessed, then decompressed and checksum-verified.
#[derive(Debug)]
pub struct RecordReader {
    path: PathBuf,
    file: Mutex<File>,
    entries: Vec<IndexEntry>,
    lookup: HashMap<String, usize>,
}

impl RecordReader {
    pub fn open(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let entries = read_index(&mut file)?;

        let mut lookup = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            lookup.insert(entry.key.clone(), i);
        }

        debug!(path = %path.display(), records = entries.len(), "Opened record container");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            entries,
            lookup,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keys in the order they were written.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup.contains_key(key)
    }

    pub fn kind(&self, key: &str) -> RecordResult<ValueKind> {
        Ok(self.entry(key)?.kind)
    }

    pub fn get(&self, key: &str) -> RecordResult<RecordValue> {
        let entry = self.entry(key)?;
        let raw = self.raw_bytes(entry)?;
        RecordValue::decode(key, entry.kind, Bytes::from(raw))
    }

    pub fn read_string(&self, key: &str) -> RecordResult<String> {
        match self.typed(key, ValueKind::String)? {
            RecordValue::String(s) => Ok(s),
            other => Err(self.mismatch(key, ValueKind::String, other.kind())),
        }
    }

    pub fn read_integer(&self, key: &str) -> RecordResult<i64> {
        match self.typed(key, ValueKind::Integer)? {
            RecordValue::Integer(v) => Ok(v),
            other => Err(self.mismatch(key, ValueKind::Integer, other.kind())),
        }
    }

    pub fn read_integers(&self, key: &str) -> RecordResult<Vec<i64>> {
        match self.typed(key, ValueKind::Integers)? {
            RecordValue::Integers(v) => Ok(v),
            other => Err(self.mismatch(key, ValueKind::Integers, other.kind())),
        }
    }

    pub fn read_doubles(&self, key: &str) -> RecordResult<Vec<f64>> {
        match self.typed(key, ValueKind::Doubles)? {
            RecordValue::Doubles(v) => Ok(v),
            other => Err(self.mismatch(key, ValueKind::Doubles, other.kind())),
        }
    }

    /// Number of values of an array record, without reading it.
    pub fn doubles_len(&self, key: &str) -> RecordResult<usize> {
        let entry = self.entry_of_kind(key, ValueKind::Doubles)?;
        Ok(entry.raw_length as usize / 8)
    }

    /// Decode an array record into `out`, which must have the stored length.
    pub fn read_doubles_into(&self, key: &str, out: &mut [f64]) -> RecordResult<()> {
        let entry = self.entry_of_kind(key, ValueKind::Doubles)?;
        let raw = self.raw_bytes(entry)?;
        let stored = doubles_len(key, &raw)?;
        if stored != out.len() {
            return Err(RecordError::LengthMismatch {
                key: key.to_string(),
                stored,
                provided: out.len(),
            });
        }
        decode_doubles_into(&raw, out);
        Ok(())
    }

    fn typed(&self, key: &str, expected: ValueKind) -> RecordResult<RecordValue> {
        self.entry_of_kind(key, expected)?;
        self.get(key)
    }

    fn entry(&self, key: &str) -> RecordResult<&IndexEntry> {
        self.lookup
            .get(key)
            .map(|i| &self.entries[*i])
            .ok_or_else(|| RecordError::KeyNotFound(key.to_string()))
    }

    fn entry_of_kind(&self, key: &str, expected: ValueKind) -> RecordResult<&IndexEntry> {
        let entry = self.entry(key)?;
        if entry.kind != expected {
            return Err(self.mismatch(key, expected, entry.kind));
        }
        Ok(entry)
    }

    fn mismatch(&self, key: &str, expected: ValueKind, found: ValueKind) -> RecordError {
        RecordError::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
        }
    }

    /// Stored bytes of a record, read from the file.
    fn stored_bytes(&self, entry: &IndexEntry) -> RecordResult<Vec<u8>> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| RecordError::Corrupt("record file lock poisoned".to_string()))?;
        file.seek(SeekFrom::Start(entry.offset))?;
        let mut stored = vec![0u8; entry.length as usize];
        file.read_exact(&mut stored)?;
        Ok(stored)
    }

    /// Uncompressed, checksum-verified bytes of a record.
    fn raw_bytes(&self, entry: &IndexEntry) -> RecordResult<Vec<u8>> {
        let stored = self.stored_bytes(entry)?;
        let raw = entry
            .compression
            .decompress(&stored, entry.raw_length as usize)?;

        if raw.len() as u64 != entry.raw_length {
            return Err(RecordError::Corrupt(format!(
                "record {} decoded to {} bytes, index says {}",
                entry.key,
                raw.len(),
                entry.raw_length
            )));
        }
        let computed = crc32fast::hash(&raw);
        if computed != entry.crc32 {
            return Err(RecordError::ChecksumMismatch {
                key: entry.key.clone(),
                stored: entry.crc32,
                computed,
            });
        }
        Ok(raw)
    }
}

/// Validate header and trailer and load the index. Every entry must lie
/// between the header and the index.
fn read_index<R: Read + Seek>(source: &mut R) -> RecordResult<Vec<IndexEntry>> {
    let file_len = source.seek(SeekFrom::End(0))?;
    let min_len = (HEADER_MAGIC.len() + TRAILER_LEN) as u64;
    if file_len < min_len {
        return Err(RecordError::Corrupt(format!(
            "{} bytes is too short for a record container",
            file_len
        )));
    }

    let mut magic = [0u8; 8];
    source.seek(SeekFrom::Start(0))?;
    source.read_exact(&mut magic)?;
    if &magic != HEADER_MAGIC {
        return Err(RecordError::Corrupt("missing header magic".to_string()));
    }

    let mut trailer = [0u8; TRAILER_LEN];
    source.seek(SeekFrom::Start(file_len - TRAILER_LEN as u64))?;
    source.read_exact(&mut trailer)?;
    if &trailer[8..] != TRAILER_MAGIC {
        return Err(RecordError::Corrupt("missing trailer magic".to_string()));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&trailer[..8]);
    let index_len = u64::from_le_bytes(len_bytes);

    let index_end = file_len - TRAILER_LEN as u64;
    let index_start = index_end
        .checked_sub(index_len)
        .filter(|start| *start >= HEADER_MAGIC.len() as u64)
        .ok_or_else(|| RecordError::Corrupt(format!("index length {} out of range", index_len)))?;

    let mut index_bytes = vec![0u8; index_len as usize];
    source.seek(SeekFrom::Start(index_start))?;
    source.read_exact(&mut index_bytes)?;
    let index: RecordIndex = serde_json::from_slice(&index_bytes)?;

    for entry in &index.entries {
        let end = entry.offset.saturating_add(entry.length);
        if entry.offset < HEADER_MAGIC.len() as u64 || end > index_start {
            return Err(RecordError::Corrupt(format!(
                "record {} lies outside the payload area",
                entry.key
            )));
        }
    }
    Ok(index.entries)
}
