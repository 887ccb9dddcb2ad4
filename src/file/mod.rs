//! Byte-level access to compiled units.
//!
//! - [`crate::file::parser::Parser`] - Cursor-based decoding of class-file structures
//! - [`crate::file::io`] - Big-endian primitives shared by the reader and the serializer

pub mod io;
pub mod parser;
