//! Field and method tables (JVMS §4.5, §4.6) and the access flags of classes and members.

use bitflags::bitflags;

use crate::{
    classfile::{
        attribute::{Attribute, AttributeData, CodeAttribute},
        constpool::ConstantPool,
    },
    file::{io::write_be, parser::Parser},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property flags
    pub struct ClassAccess: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared final
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial
        const SUPER = 0x0020;
        /// Is an interface
        const INTERFACE = 0x0200;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
        /// Is a module
        const MODULE = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field access and property flags
    pub struct FieldAccess: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Declared volatile
        const VOLATILE = 0x0040;
        /// Declared transient
        const TRANSIENT = 0x0080;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Element of an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property flags
    pub struct MethodAccess: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// A bridge method, generated by the compiler
        const BRIDGE = 0x0040;
        /// Declared with variable arity
        const VARARGS = 0x0080;
        /// Declared native
        const NATIVE = 0x0100;
        /// Declared abstract
        const ABSTRACT = 0x0400;
        /// Declared strictfp
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

/// An entry of the `fields` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    /// Access flags
    pub access: FieldAccess,
    /// Index of the `Utf8` field name
    pub name_index: u16,
    /// Index of the `Utf8` field descriptor
    pub descriptor_index: u16,
    /// Field attributes (`ConstantValue`, `Signature`, ...)
    pub attributes: Vec<Attribute>,
}

/// An entry of the `methods` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    /// Access flags
    pub access: MethodAccess,
    /// Index of the `Utf8` method name
    pub name_index: u16,
    /// Index of the `Utf8` method descriptor
    pub descriptor_index: u16,
    /// Method attributes (`Code`, `Exceptions`, ...)
    pub attributes: Vec<Attribute>,
}

impl FieldInfo {
    /// Parse one field entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on truncation.
    pub fn read(parser: &mut Parser, pool: &ConstantPool) -> Result<Self> {
        Ok(FieldInfo {
            access: FieldAccess::from_bits_retain(parser.read_be()?),
            name_index: parser.read_be()?,
            descriptor_index: parser.read_be()?,
            attributes: Attribute::read_table(parser, pool)?,
        })
    }

    /// Serialize this field entry.
    ///
    /// # Errors
    /// See [`Attribute::write`].
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_be(out, self.access.bits());
        write_be(out, self.name_index);
        write_be(out, self.descriptor_index);
        Attribute::write_table(&self.attributes, out)
    }

    /// Resolve the field name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the index does not resolve.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    /// Resolve the field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the index does not resolve.
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// Returns `true` for per-instance (non-static) fields.
    #[must_use]
    pub fn is_instance(&self) -> bool {
        !self.access.contains(FieldAccess::STATIC)
    }
}

impl MethodInfo {
    /// Parse one method entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on truncation.
    pub fn read(parser: &mut Parser, pool: &ConstantPool) -> Result<Self> {
        Ok(MethodInfo {
            access: MethodAccess::from_bits_retain(parser.read_be()?),
            name_index: parser.read_be()?,
            descriptor_index: parser.read_be()?,
            attributes: Attribute::read_table(parser, pool)?,
        })
    }

    /// Serialize this method entry.
    ///
    /// # Errors
    /// See [`Attribute::write`].
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_be(out, self.access.bits());
        write_be(out, self.name_index);
        write_be(out, self.descriptor_index);
        Attribute::write_table(&self.attributes, out)
    }

    /// Resolve the method name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the index does not resolve.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    /// Resolve the method descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the index does not resolve.
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// The method body, if the method has one.
    #[must_use]
    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|a| match &a.data {
            AttributeData::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Mutable access to the method body.
    pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
        self.attributes.iter_mut().find_map(|a| match &mut a.data {
            AttributeData::Code(code) => Some(code),
            _ => None,
        })
    }
}
