//! Sequential reader over a multi-message GRIB2 file.

use std::io::{BufReader, Read, Seek, SeekFrom};

use bytes::Bytes;
use tracing::{debug, trace};

use crate::message::Grib2Message;
use crate::sections::parse_indicator;
use crate::Grib2Error;

const INDICATOR_LEN: usize = 16;

/// Reads GRIB2 messages one after another from a seekable source.
///
/// Bytes between messages that are not part of a "GRIB" header are skipped,
/// the same way padded files are handled by other GRIB tools.
pub struct Grib2Reader<R> {
    inner: BufReader<R>,
}

impl<R: Read + Seek> Grib2Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
        }
    }

    /// Count the messages from the current position to the end of the
    /// source without decoding them. The read position is restored.
    pub fn count_messages(&mut self) -> Result<usize, Grib2Error> {
        let start = self.inner.stream_position()?;
        let mut count = 0;

        while let Some(indicator) = self.read_indicator()? {
            let remaining = indicator_remaining(&indicator)?;
            self.inner.seek(SeekFrom::Current(remaining as i64))?;
            count += 1;
        }

        self.inner.seek(SeekFrom::Start(start))?;
        debug!(count, "Counted GRIB2 messages");
        Ok(count)
    }

    /// Read and decode the next message, `None` at end of input.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        let Some(indicator) = self.read_indicator()? else {
            return Ok(None);
        };
        let remaining = indicator_remaining(&indicator)?;

        let mut buffer = Vec::with_capacity(INDICATOR_LEN + remaining);
        buffer.extend_from_slice(&indicator);
        buffer.resize(INDICATOR_LEN + remaining, 0);
        self.inner
            .read_exact(&mut buffer[INDICATOR_LEN..])
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    Grib2Error::InvalidFormat("Truncated GRIB2 message".to_string())
                }
                _ => Grib2Error::Io(e),
            })?;

        trace!(length = buffer.len(), "Read GRIB2 message");
        Grib2Message::parse(Bytes::from(buffer)).map(Some)
    }

    /// Scan forward to the next "GRIB" magic and return the full 16-byte
    /// indicator section, `None` at end of input.
    fn read_indicator(&mut self) -> Result<Option<[u8; INDICATOR_LEN]>, Grib2Error> {
        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut byte = [0u8; 1];

        loop {
            if self.inner.read(&mut byte)? == 0 {
                return Ok(None);
            }
            if filled < 4 {
                window[filled] = byte[0];
                filled += 1;
            } else {
                window.rotate_left(1);
                window[3] = byte[0];
            }
            if filled == 4 && &window == b"GRIB" {
                break;
            }
        }

        let mut indicator = [0u8; INDICATOR_LEN];
        indicator[..4].copy_from_slice(b"GRIB");
        self.inner
            .read_exact(&mut indicator[4..])
            .map_err(|_| Grib2Error::InvalidFormat("Truncated indicator section".to_string()))?;
        Ok(Some(indicator))
    }
}

/// Number of bytes following the indicator section.
fn indicator_remaining(indicator: &[u8; INDICATOR_LEN]) -> Result<usize, Grib2Error> {
    let parsed = parse_indicator(indicator)?;
    let length = parsed.message_length as usize;
    if length < INDICATOR_LEN + 4 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Message length {} is shorter than a minimal message",
            length
        )));
    }
    Ok(length - INDICATOR_LEN)
}
