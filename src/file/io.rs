//! Big-endian reading and writing utilities for class-file parsing.
//!
//! Every multi-byte quantity in a compiled unit is stored big-endian (JVMS §4). This module
//! provides the bounds-checked primitives used by [`crate::file::parser::Parser`] and by the
//! serializer in [`crate::classfile`].
//!
//! # Key Components
//!
//! - [`crate::file::io::ClassIO`] - Trait mapping a primitive to its fixed-size byte array
//! - [`crate::file::io::read_be_at`] - Read a value at an offset and advance it
//! - [`crate::file::io::write_be`] - Append a value to an output buffer
//! - [`crate::file::io::write_be_at`] - Overwrite a value in place (used when patching code)
//!
//! # Error Handling
//!
//! Reads past the end of the buffer are reported as [`crate::Error::MalformedUnit`]: for a
//! compiled unit, running out of bytes always means a truncated section.

use crate::Result;

/// Trait for implementing type-specific safe big-endian reading and writing.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait ClassIO: Sized + Copy {
    /// Associated byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io! {
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
}

/// Safely reads a value of type `T` in big-endian byte order from the start of a buffer.
///
/// # Errors
/// Returns [`crate::Error::MalformedUnit`] if there are insufficient bytes.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at `offset`, advancing it.
///
/// # Errors
/// Returns [`crate::Error::MalformedUnit`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust,ignore
/// let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
/// let mut offset = 0;
/// let first: u16 = read_be_at(&data, &mut offset)?;
/// let second: u32 = read_be_at(&data, &mut offset)?;
/// assert_eq!((first, second, offset), (1, 2, 6));
/// ```
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(T::from_be_bytes(read))
}

/// Appends `value` in big-endian byte order to `out`.
pub fn write_be<T: ClassIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}

/// Overwrites the bytes at `offset` with `value` in big-endian byte order, advancing `offset`.
///
/// # Errors
/// Returns [`crate::Error::MalformedUnit`] if the value does not fit in the buffer.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn test_read_be_u16() {
        let result = read_be::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102);
    }

    #[test]
    fn test_read_be_u32() {
        let result = read_be::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102_0304);
    }

    #[test]
    fn test_read_be_i64() {
        let result = read_be::<i64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_read_be_f32() {
        let data = 1.5_f32.to_be_bytes();
        assert_eq!(read_be::<f32>(&data).unwrap(), 1.5);
    }

    #[test]
    fn test_read_advances_offset() {
        let mut offset = 2;
        let value: u16 = read_be_at(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(value, 0x0304);
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_read_out_of_bounds() {
        let mut offset = 6;
        assert!(read_be_at::<u32>(&TEST_BUFFER, &mut offset).is_err());
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_write_appends() {
        let mut out = Vec::new();
        write_be(&mut out, 0xCAFE_BABE_u32);
        write_be(&mut out, 0x0034_u16);
        assert_eq!(out, [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34]);
    }

    #[test]
    fn test_write_in_place() {
        let mut data = [0u8; 4];
        let mut offset = 1;
        write_be_at(&mut data, &mut offset, 0x0102_u16).unwrap();
        assert_eq!(data, [0x00, 0x01, 0x02, 0x00]);
        assert_eq!(offset, 3);

        let mut offset = 3;
        assert!(write_be_at(&mut data, &mut offset, 0x0102_u16).is_err());
    }
}
