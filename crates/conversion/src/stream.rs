//! Sequential access to the messages of a GRIB2 file.

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use grib2_parser::{Grib2Message, Grib2Reader};
use tracing::{debug, info};

use crate::error::{ConversionError, Result};

/// Reader over a multi-message GRIB2 file holding one decoded message at a time.
///
/// The first message is decoded on [`open`](Self::open). [`advance`](Self::advance)
/// drops the current message before decoding the next one, and dropping the
/// stream releases the message and the file.
pub struct MessageStream {
    path: PathBuf,
    reader: Grib2Reader<File>,
    count: usize,
    ordinal: usize,
    current: Option<Grib2Message>,
    /// Most recent explicit bitmap, for messages that reuse it.
    last_bitmap: Option<Bytes>,
}

impl MessageStream {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ConversionError::Io {
            path: path.clone(),
            source,
        })?;

        let mut reader = Grib2Reader::new(file);
        let count = reader
            .count_messages()
            .map_err(|e| ConversionError::from_grib(&path, e))?;

        let first = reader
            .next_message()
            .map_err(|e| ConversionError::from_grib(&path, e))?
            .ok_or_else(|| {
                ConversionError::Format(format!("{}: no GRIB messages found", path.display()))
            })?;

        info!(path = %path.display(), messages = count, "Opened GRIB file");

        let mut stream = Self {
            path,
            reader,
            count,
            ordinal: 1,
            current: None,
            last_bitmap: None,
        };
        stream.set_current(first);
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of messages in the file, known from a header scan at open time.
    pub fn count(&self) -> usize {
        self.count
    }

    /// 1-based ordinal of the current message.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn is_last(&self) -> bool {
        self.ordinal >= self.count
    }

    pub fn current(&self) -> Result<&Grib2Message> {
        self.current.as_ref().ok_or_else(|| {
            ConversionError::Format(format!(
                "{}: message {} could not be decoded",
                self.path.display(),
                self.ordinal
            ))
        })
    }

    /// Number of values in the current message, 0 when there is none.
    pub fn current_values_size(&self) -> usize {
        self.current.as_ref().map_or(0, |m| m.num_data_points())
    }

    /// Decode the current message's values into the front of `out` and return
    /// the number of values written.
    pub fn current_values_into(&self, out: &mut [f64]) -> Result<usize> {
        let message = self.current()?;
        let required = message.num_data_points();
        if out.len() < required {
            return Err(ConversionError::BufferTooSmall {
                required,
                provided: out.len(),
            });
        }
        message
            .unpack_into(&mut out[..required], self.last_bitmap.as_ref())
            .map_err(|e| ConversionError::from_grib(&self.path, e))?;
        Ok(required)
    }

    /// An owned copy of the current message's values.
    pub fn current_values(&self) -> Result<Vec<f64>> {
        let mut values = vec![0.0; self.current_values_size()];
        self.current_values_into(&mut values)?;
        Ok(values)
    }

    pub fn current_string(&self, key: &str) -> Result<String> {
        self.current()?
            .get_string(key)
            .map_err(|e| ConversionError::from_grib(&self.path, e))
    }

    pub fn current_long(&self, key: &str) -> Result<i64> {
        self.current()?
            .get_long(key)
            .map_err(|e| ConversionError::from_grib(&self.path, e))
    }

    /// Points on each latitude of the current message's grid, north to
    /// south; empty for grids with a fixed row length.
    pub fn current_points_per_row(&self) -> Result<Vec<usize>> {
        Ok(self
            .current()?
            .grid_definition
            .points_per_row
            .iter()
            .map(|p| *p as usize)
            .collect())
    }

    /// Move to the next message. Returns `false` without touching the file
    /// when the current message is the last one.
    pub fn advance(&mut self) -> Result<bool> {
        if self.is_last() {
            return Ok(false);
        }

        self.current = None;
        self.ordinal += 1;
        let next = self
            .reader
            .next_message()
            .map_err(|e| ConversionError::from_grib(&self.path, e))?
            .ok_or_else(|| {
                ConversionError::Format(format!(
                    "{}: file ended before message {} of {}",
                    self.path.display(),
                    self.ordinal,
                    self.count
                ))
            })?;
        self.set_current(next);

        debug!(ordinal = self.ordinal, count = self.count, "Advanced to next message");
        Ok(true)
    }

    /// Consume the stream, yielding every message from the current one on
    /// together with its decoded values.
    pub fn into_messages(self) -> Messages {
        Messages {
            stream: self,
            started: false,
            finished: false,
        }
    }

    fn set_current(&mut self, message: Grib2Message) {
        if let Some(bitmap) = message.explicit_bitmap() {
            self.last_bitmap = Some(bitmap.clone());
        }
        self.current = Some(message);
    }
}

/// An owned message produced by [`MessageStream::into_messages`].
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub ordinal: usize,
    pub message: Grib2Message,
    pub values: Vec<f64>,
}

/// Consuming iterator over the remaining messages of a stream.
pub struct Messages {
    stream: MessageStream,
    started: bool,
    finished: bool,
}

impl Iterator for Messages {
    type Item = Result<DecodedMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.started {
            match self.stream.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
        self.started = true;

        let values = match self.stream.current_values() {
            Ok(values) => values,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };
        let message = self.stream.current.take()?;
        Some(Ok(DecodedMessage {
            ordinal: self.stream.ordinal,
            message,
            values,
        }))
    }
}
