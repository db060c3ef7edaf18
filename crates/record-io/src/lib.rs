//! Self-describing record container.
//!
//! A container is a flat namespace of string keys mapped to typed values
//! (string, integer, array of doubles or array of integers). Array values may
//! be stored with deflate compression; readers decompress transparently. Every
//! record carries a CRC32 of its uncompressed bytes which is verified on read.
//! Opening a container reads only its index; records are read on access.
//!
//! # Example
//!
//! ```no_run
//! use record_io::{Compression, RecordReader, RecordWriter};
//!
//! let mut writer = RecordWriter::new("out.atlas").with_array_compression(Compression::Deflate);
//! writer.set("grid.name", "O1280");
//! writer.set("fields.size", 1i64);
//! writer.set("fields[0].array", vec![1.0, 2.0, 3.0]);
//! writer.write()?;
//!
//! let reader = RecordReader::open("out.atlas")?;
//! assert_eq!(reader.read_string("grid.name")?, "O1280");
//! # Ok::<(), record_io::RecordError>(())
//! ```

pub mod error;
pub mod format;
pub mod reader;
pub mod value;
pub mod writer;

pub use error::{RecordError, RecordResult};
pub use format::{Compression, IndexEntry};
pub use reader::RecordReader;
pub use value::{RecordValue, ValueKind};
pub use writer::RecordWriter;
