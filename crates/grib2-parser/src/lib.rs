//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! This crate provides a pure Rust implementation for reading GRIB2 files
//! one message at a time. It covers what a converter needs: message framing,
//! the grid/product/data-representation sections, ecCodes-style metadata
//! keys, and unpacking of simple and IEEE packed values.

pub mod error;
pub mod message;
pub mod reader;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use error::Grib2Error;
pub use message::{Grib2Message, KeyValue};
pub use reader::Grib2Reader;
pub use unpacking::{unpack_ieee, unpack_simple};
