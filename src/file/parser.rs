//! Cursor-based binary parser for compiled units.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a byte slice used to decode class-file structures: the fixed header, constant pool, member
//! tables and attributes.
//!
//! # Usage Examples
//!
//! ```rust
//! use weavescope::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 0);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), weavescope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A generic binary data parser for reading class-file structures.
///
/// `Parser` maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if advancing would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if self.position + step > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Read a type `T` from the current position in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if reading would exceed the data length.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a `u16` length prefix followed by that many items decoded by `f`.
    ///
    /// Most class-file tables (interfaces, fields, methods, attributes) use this shape.
    ///
    /// # Errors
    /// Returns the first error produced by `f`, or a truncation error.
    pub fn read_table<T, F>(&mut self, mut f: F) -> Result<Vec<T>>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let count = self.read_be::<u16>()?;
        let mut items = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Execute a closure transactionally, rolling back on failure.
    ///
    /// # Errors
    /// Returns any error produced by the closure `f`. When an error is returned,
    /// the parser position is automatically restored to its state before the call.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sequence() {
        let data = [0x00, 0x02, 0xAA, 0xBB, 0x01];
        let mut parser = Parser::new(&data);

        let items = parser.read_table(|p| p.read_be::<u8>()).unwrap();
        assert_eq!(items, vec![0xAA, 0xBB]);
        assert_eq!(parser.pos(), 4);
        assert!(parser.has_more_data());
    }

    #[test]
    fn test_read_bytes_bounds() {
        let data = [0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_bytes(2).unwrap(), &[0x01, 0x02]);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn test_truncated_table() {
        let data = [0x00, 0x03, 0xAA];
        let mut parser = Parser::new(&data);
        assert!(parser.read_table(|p| p.read_be::<u8>()).is_err());
    }

    #[test]
    fn test_transactional_rolls_back() {
        let data = [0x01];
        let mut parser = Parser::new(&data);

        let result: Result<u32> = parser.transactional(|p| p.read_be());
        assert!(result.is_err());
        assert_eq!(parser.pos(), 0);
        assert!(!parser.is_empty());
        assert_eq!(parser.len(), 1);
    }
}
