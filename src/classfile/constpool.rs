//! The constant pool of a compiled unit (JVMS §4.4).
//!
//! Entries are stored 1-based, exactly as they are addressed from the rest of the unit. `Long`
//! and `Double` constants occupy two slots; the second slot is kept as an unusable gap so
//! indices survive a read/write round trip unchanged.
//!
//! Transformation only ever *appends* entries (through the `intern_*` family), so every index
//! recorded elsewhere in the unit, including inside stack map frames, stays valid.

use crate::{
    file::{io::write_be, parser::Parser},
    Result,
};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Modified UTF-8 string, decoded
    Utf8(String),
    /// 32-bit integer constant
    Integer(i32),
    /// 32-bit float constant, kept as raw bits to preserve NaN payloads
    Float(u32),
    /// 64-bit integer constant (occupies two slots)
    Long(i64),
    /// 64-bit float constant as raw bits (occupies two slots)
    Double(u64),
    /// Class or array type, index of its internal name
    Class(u16),
    /// String literal, index of its `Utf8`
    String(u16),
    /// Field reference: class index, name-and-type index
    Fieldref(u16, u16),
    /// Method reference: class index, name-and-type index
    Methodref(u16, u16),
    /// Interface method reference: class index, name-and-type index
    InterfaceMethodref(u16, u16),
    /// Name index, descriptor index
    NameAndType(u16, u16),
    /// Reference kind, reference index
    MethodHandle(u8, u16),
    /// Descriptor index
    MethodType(u16),
    /// Bootstrap method index, name-and-type index
    Dynamic(u16, u16),
    /// Bootstrap method index, name-and-type index
    InvokeDynamic(u16, u16),
    /// Module name index
    Module(u16),
    /// Package name index
    Package(u16),
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A resolved field or method reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Internal name of the owning class
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
}

/// The constant pool of one compiled unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    /// Slot 0 is unused; wide constants leave a `None` gap after themselves.
    entries: Vec<Option<Constant>>,
}

impl ConstantPool {
    /// Create an empty constant pool.
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
        }
    }

    /// Parse the `constant_pool_count` and all entries that follow it.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on an unknown tag or truncated entry.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("constant pool count is zero"));
        }

        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(None);

        while entries.len() < usize::from(count) {
            let constant = Self::read_entry(parser)?;
            let wide = constant.is_wide();
            entries.push(Some(constant));
            if wide {
                if entries.len() >= usize::from(count) {
                    return Err(malformed_error!("wide constant in the last pool slot"));
                }
                entries.push(None);
            }
        }

        Ok(ConstantPool { entries })
    }

    fn read_entry(parser: &mut Parser) -> Result<Constant> {
        let tag = parser.read_be::<u8>()?;
        let constant = match tag {
            TAG_UTF8 => {
                let len = parser.read_be::<u16>()?;
                let bytes = parser.read_bytes(usize::from(len))?;
                Constant::Utf8(decode_modified_utf8(bytes)?)
            }
            TAG_INTEGER => Constant::Integer(parser.read_be::<i32>()?),
            TAG_FLOAT => Constant::Float(parser.read_be::<u32>()?),
            TAG_LONG => Constant::Long(parser.read_be::<i64>()?),
            TAG_DOUBLE => Constant::Double(parser.read_be::<u64>()?),
            TAG_CLASS => Constant::Class(parser.read_be::<u16>()?),
            TAG_STRING => Constant::String(parser.read_be::<u16>()?),
            TAG_FIELDREF => Constant::Fieldref(parser.read_be()?, parser.read_be()?),
            TAG_METHODREF => Constant::Methodref(parser.read_be()?, parser.read_be()?),
            TAG_INTERFACE_METHODREF => {
                Constant::InterfaceMethodref(parser.read_be()?, parser.read_be()?)
            }
            TAG_NAME_AND_TYPE => Constant::NameAndType(parser.read_be()?, parser.read_be()?),
            TAG_METHOD_HANDLE => Constant::MethodHandle(parser.read_be()?, parser.read_be()?),
            TAG_METHOD_TYPE => Constant::MethodType(parser.read_be()?),
            TAG_DYNAMIC => Constant::Dynamic(parser.read_be()?, parser.read_be()?),
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic(parser.read_be()?, parser.read_be()?),
            TAG_MODULE => Constant::Module(parser.read_be()?),
            TAG_PACKAGE => Constant::Package(parser.read_be()?),
            other => return Err(malformed_error!("unknown constant pool tag {}", other)),
        };
        Ok(constant)
    }

    /// Serialize the count and all entries.
    pub fn write(&self, out: &mut Vec<u8>) {
        // `entries.len()` is bounded by `intern` and by the u16 count read from the input.
        #[allow(clippy::cast_possible_truncation)]
        write_be(out, self.entries.len() as u16);

        for constant in self.entries.iter().flatten() {
            match constant {
                Constant::Utf8(value) => {
                    let bytes = encode_modified_utf8(value);
                    out.push(TAG_UTF8);
                    #[allow(clippy::cast_possible_truncation)]
                    write_be(out, bytes.len() as u16);
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(v) => {
                    out.push(TAG_INTEGER);
                    write_be(out, *v);
                }
                Constant::Float(bits) => {
                    out.push(TAG_FLOAT);
                    write_be(out, *bits);
                }
                Constant::Long(v) => {
                    out.push(TAG_LONG);
                    write_be(out, *v);
                }
                Constant::Double(bits) => {
                    out.push(TAG_DOUBLE);
                    write_be(out, *bits);
                }
                Constant::Class(i) => write_tagged(out, TAG_CLASS, &[*i]),
                Constant::String(i) => write_tagged(out, TAG_STRING, &[*i]),
                Constant::Fieldref(c, n) => write_tagged(out, TAG_FIELDREF, &[*c, *n]),
                Constant::Methodref(c, n) => write_tagged(out, TAG_METHODREF, &[*c, *n]),
                Constant::InterfaceMethodref(c, n) => {
                    write_tagged(out, TAG_INTERFACE_METHODREF, &[*c, *n]);
                }
                Constant::NameAndType(n, d) => write_tagged(out, TAG_NAME_AND_TYPE, &[*n, *d]),
                Constant::MethodHandle(kind, i) => {
                    out.push(TAG_METHOD_HANDLE);
                    out.push(*kind);
                    write_be(out, *i);
                }
                Constant::MethodType(d) => write_tagged(out, TAG_METHOD_TYPE, &[*d]),
                Constant::Dynamic(b, n) => write_tagged(out, TAG_DYNAMIC, &[*b, *n]),
                Constant::InvokeDynamic(b, n) => write_tagged(out, TAG_INVOKE_DYNAMIC, &[*b, *n]),
                Constant::Module(n) => write_tagged(out, TAG_MODULE, &[*n]),
                Constant::Package(n) => write_tagged(out, TAG_PACKAGE, &[*n]),
            }
        }
    }

    /// Number of slots, including the unused slot 0 (the on-disk `constant_pool_count`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool holds no constants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Look up the constant at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] for index 0, a gap slot, or an index past the end.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or_else(|| malformed_error!("invalid constant pool index {}", index))
    }

    /// Resolve a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the entry is missing or of another kind.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            other => Err(malformed_error!(
                "constant {} is not Utf8 but {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `Class` entry to its internal name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the entry is missing or of another kind.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(malformed_error!(
                "constant {} is not a Class but {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `NameAndType` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the entry is missing or of another kind.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType(name, descriptor) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(malformed_error!(
                "constant {} is not a NameAndType but {:?}",
                index,
                other
            )),
        }
    }

    /// Resolve a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the entry is missing or of another kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class, nat) = match self.get(index)? {
            Constant::Fieldref(c, n)
            | Constant::Methodref(c, n)
            | Constant::InterfaceMethodref(c, n) => (*c, *n),
            other => {
                return Err(malformed_error!(
                    "constant {} is not a member reference but {:?}",
                    index,
                    other
                ))
            }
        };
        let (name, descriptor) = self.name_and_type(nat)?;
        Ok(MemberRef {
            owner: self.class_name(class)?,
            name,
            descriptor,
        })
    }

    fn find(&self, constant: &Constant) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry.as_ref() == Some(constant))
            .and_then(|index| u16::try_from(index).ok())
    }

    fn push(&mut self, constant: Constant) -> Result<u16> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        let index = u16::try_from(self.entries.len())
            .ok()
            .filter(|index| usize::from(*index) + slots <= usize::from(u16::MAX))
            .ok_or_else(|| malformed_error!("constant pool overflow"))?;
        let wide = constant.is_wide();
        self.entries.push(Some(constant));
        if wide {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Return the index of `constant`, appending it if the pool does not hold it yet.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the pool would exceed 65535 slots.
    pub fn intern(&mut self, constant: Constant) -> Result<u16> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push(constant),
        }
    }

    /// Intern a `Utf8` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(Constant::Utf8(value.to_string()))
    }

    /// Intern a `Class` entry for an internal name.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        self.intern(Constant::Class(name))
    }

    /// Intern a `NameAndType` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType(name, descriptor))
    }

    /// Intern a `Fieldref` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let nat = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Fieldref(class, nat))
    }

    /// Intern a `Methodref` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class = self.intern_class(owner)?;
        let nat = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref(class, nat))
    }

    /// Intern an `Integer` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::intern`].
    pub fn intern_integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Constant::Integer(value))
    }
}

fn write_tagged(out: &mut Vec<u8>, tag: u8, values: &[u16]) {
    out.push(tag);
    for value in values {
        write_be(out, *value);
    }
}

/// Decode the modified UTF-8 used by class files (JVMS §4.4.7).
///
/// Characters are stored as UTF-16 code units of one to three bytes each; supplementary
/// characters appear as two encoded surrogates.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes
                .get(i + 1)
                .ok_or_else(|| malformed_error!("truncated modified UTF-8 sequence"))?;
            units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let (Some(b2), Some(b3)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
                return Err(malformed_error!("truncated modified UTF-8 sequence"));
            };
            units.push(
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
            );
            i += 3;
        } else {
            return Err(malformed_error!("invalid modified UTF-8 lead byte 0x{:02x}", b));
        }
    }

    String::from_utf16(&units).map_err(|_| malformed_error!("unpaired surrogate in Utf8 constant"))
}

/// Encode a string as modified UTF-8: NUL becomes `C0 80`, supplementary characters are
/// written as surrogate pairs.
#[allow(clippy::cast_possible_truncation)]
fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
