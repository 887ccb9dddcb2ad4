//! The compiled-unit model: reading, inspecting and writing class files.
//!
//! [`ClassFile`] is the owned, mutable structural model of one compiled type. It is produced by
//! [`ClassFile::read`], mutated in place by the weaving strategies, and turned back into bytes
//! by [`ClassFile::to_bytes`]. Reading and writing an unmodified unit reproduces the input
//! exactly, which is what makes "no write for untouched units" and idempotent re-runs cheap to
//! verify.
//!
//! # Key Components
//!
//! - [`ClassFile`] - The unit: header, constant pool, members, attributes
//! - [`constpool::ConstantPool`] - Indexed constants with append-only interning
//! - [`attribute`] - Decoded `Code` and annotation attributes, opaque everything else
//! - [`annotation`] - Class annotations, used for classification markers
//! - [`member`] - Field and method tables with their access flags
//! - [`descriptor::ValueKind`] - Field value kinds
//! - [`opcodes`] - Instruction length decoding for walking method bodies
//! - [`bytecode::Bytecode`] - Emitter for synthesized method bodies
//! - [`builder::ClassBuilder`] - Programmatic construction of whole units
//!
//! # Examples
//!
//! ```rust
//! use weavescope::classfile::{builder::ClassBuilder, ClassFile};
//!
//! let bytes = ClassBuilder::new("com/example/Position")
//!     .field("x", "F")
//!     .default_constructor()
//!     .to_bytes()?;
//!
//! let unit = ClassFile::read(&bytes)?;
//! assert_eq!(unit.name()?, "com/example/Position");
//! assert_eq!(unit.to_bytes()?, bytes);
//! # Ok::<(), weavescope::Error>(())
//! ```

pub mod annotation;
pub mod attribute;
pub mod builder;
pub mod bytecode;
pub mod constpool;
pub mod descriptor;
pub mod member;
#[allow(missing_docs)]
pub mod opcodes;

use std::collections::BTreeSet;

use crate::{
    classfile::{
        annotation::Annotation,
        attribute::{
            Attribute, AttributeData, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS,
        },
        constpool::ConstantPool,
        descriptor::ValueKind,
        member::{ClassAccess, FieldInfo, MethodAccess, MethodInfo},
    },
    file::{io::write_be, parser::Parser},
    Result,
};

/// Magic header of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;
/// Oldest class-file major version accepted by default (JDK 1.1).
pub const MIN_MAJOR_VERSION: u16 = 45;
/// Newest class-file major version accepted by default (JDK 25).
pub const MAX_MAJOR_VERSION: u16 = 69;
/// First major version whose verifier requires `StackMapTable` frames (JDK 7).
pub const STACK_MAP_MAJOR_VERSION: u16 = 50;

/// A field as seen by the weaver: name, value kind and, once a packed layout has been
/// assigned, its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Value kind parsed from the descriptor
    pub kind: ValueKind,
    /// Byte offset inside a packed slot, when known
    pub offset_hint: Option<u32>,
    /// `true` for static fields
    pub is_static: bool,
}

/// A method signature: name plus descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
}

/// The owned structural model of one compiled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// Constant pool
    pub pool: ConstantPool,
    /// Class access flags
    pub access: ClassAccess,
    /// `Class` index of this type
    pub this_class: u16,
    /// `Class` index of the direct supertype, 0 for `java/lang/Object` itself
    pub super_class: u16,
    /// `Class` indices of the implemented interfaces
    pub interfaces: Vec<u16>,
    /// Fields in declaration order
    pub fields: Vec<FieldInfo>,
    /// Methods in declaration order
    pub methods: Vec<MethodInfo>,
    /// Class attributes
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Parse a compiled unit, accepting the default version range.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the bytes are not a well-formed class file.
    pub fn read(data: &[u8]) -> Result<Self> {
        Self::read_versioned(data, MIN_MAJOR_VERSION, MAX_MAJOR_VERSION)
    }

    /// Parse a compiled unit whose major version must lie in `min_major..=max_major`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] for a wrong magic header, a version outside the
    /// accepted range, a truncated section, an inconsistent constant pool or trailing bytes.
    pub fn read_versioned(data: &[u8], min_major: u16, max_major: u16) -> Result<Self> {
        if data.is_empty() {
            return Err(malformed_error!("empty unit"));
        }

        let mut parser = Parser::new(data);
        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(malformed_error!("wrong magic header 0x{:08x}", magic));
        }

        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        if !(min_major..=max_major).contains(&major_version) {
            return Err(malformed_error!(
                "unsupported class file version {}.{} (accepted {}..={})",
                major_version,
                minor_version,
                min_major,
                max_major
            ));
        }

        let pool = ConstantPool::read(&mut parser)?;
        let access = ClassAccess::from_bits_retain(parser.read_be()?);
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;
        let interfaces = parser.read_table(|p| p.read_be::<u16>())?;
        let fields = parser.read_table(|p| FieldInfo::read(p, &pool))?;
        let methods = parser.read_table(|p| MethodInfo::read(p, &pool))?;
        let attributes = Attribute::read_table(&mut parser, &pool)?;

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after class attributes",
                parser.len() - parser.pos()
            ));
        }

        let unit = ClassFile {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };

        // Resolve the references every later stage relies on, so they fail here as malformed.
        unit.name()?;
        unit.super_name()?;
        for field in &unit.fields {
            ValueKind::parse(field.descriptor(&unit.pool)?)?;
            field.name(&unit.pool)?;
        }
        for method in &unit.methods {
            method.name(&unit.pool)?;
            method.descriptor(&unit.pool)?;
        }

        Ok(unit)
    }

    /// Serialize the unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if a table outgrows its on-disk size limit.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(1024);
        write_be(&mut out, MAGIC);
        write_be(&mut out, self.minor_version);
        write_be(&mut out, self.major_version);
        self.pool.write(&mut out);
        write_be(&mut out, self.access.bits());
        write_be(&mut out, self.this_class);
        write_be(&mut out, self.super_class);

        write_be(&mut out, table_len(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            write_be(&mut out, *interface);
        }

        write_be(&mut out, table_len(self.fields.len(), "fields")?);
        for field in &self.fields {
            field.write(&mut out)?;
        }

        write_be(&mut out, table_len(self.methods.len(), "methods")?);
        for method in &self.methods {
            method.write(&mut out)?;
        }

        Attribute::write_table(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Internal name of this type, e.g. `com/example/Position`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if `this_class` does not resolve.
    pub fn name(&self) -> Result<&str> {
        self.pool.class_name(self.this_class)
    }

    /// Internal name of the direct supertype, `None` only for `java/lang/Object`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if `super_class` does not resolve.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.pool.class_name(self.super_class).map(Some)
    }

    /// Internal names of the implemented interfaces.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if an interface index does not resolve.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.pool.class_name(*index))
            .collect()
    }

    /// Replace the direct supertype.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the constant pool overflows.
    pub fn set_super_name(&mut self, name: &str) -> Result<()> {
        self.super_class = self.pool.intern_class(name)?;
        Ok(())
    }

    /// All class annotations with their visibility (`true` = runtime visible).
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if an attribute name does not resolve.
    pub fn annotations(&self) -> Result<Vec<(&Annotation, bool)>> {
        let mut found = Vec::new();
        for attribute in &self.attributes {
            if let AttributeData::Annotations(list) = &attribute.data {
                let visible = attribute.name(&self.pool)? == RUNTIME_VISIBLE_ANNOTATIONS;
                found.extend(list.iter().map(|a| (a, visible)));
            }
        }
        Ok(found)
    }

    /// Find the first class annotation with the given type descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if an annotation type does not resolve.
    pub fn find_annotation(&self, descriptor: &str) -> Result<Option<&Annotation>> {
        for (annotation, _) in self.annotations()? {
            if annotation.type_descriptor(&self.pool)? == descriptor {
                return Ok(Some(annotation));
            }
        }
        Ok(None)
    }

    /// Attach a class-retention (`RuntimeInvisibleAnnotations`) annotation, creating the
    /// attribute when the unit has none.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the constant pool overflows.
    pub fn add_invisible_annotation(&mut self, annotation: Annotation) -> Result<()> {
        for attribute in &mut self.attributes {
            if self.pool.utf8(attribute.name_index)? == RUNTIME_INVISIBLE_ANNOTATIONS {
                if let AttributeData::Annotations(list) = &mut attribute.data {
                    list.push(annotation);
                    return Ok(());
                }
            }
        }

        let name_index = self.pool.intern_utf8(RUNTIME_INVISIBLE_ANNOTATIONS)?;
        self.attributes.push(Attribute {
            name_index,
            data: AttributeData::Annotations(vec![annotation]),
        });
        Ok(())
    }

    /// Fields in declaration order, with parsed value kinds.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if a name or descriptor does not resolve.
    pub fn fields_view(&self) -> Result<Vec<Field>> {
        self.fields
            .iter()
            .map(|field| {
                Ok(Field {
                    name: field.name(&self.pool)?.to_string(),
                    kind: ValueKind::parse(field.descriptor(&self.pool)?)?,
                    offset_hint: None,
                    is_static: !field.is_instance(),
                })
            })
            .collect()
    }

    /// Find a method by name and descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if a method name does not resolve.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Result<Option<&MethodInfo>> {
        for method in &self.methods {
            if method.name(&self.pool)? == name && method.descriptor(&self.pool)? == descriptor {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    /// The externally callable surface: signatures of all public methods.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if a method name does not resolve.
    pub fn public_method_signatures(&self) -> Result<BTreeSet<MethodSignature>> {
        let mut signatures = BTreeSet::new();
        for method in &self.methods {
            if method.access.contains(MethodAccess::PUBLIC) {
                signatures.insert(MethodSignature {
                    name: method.name(&self.pool)?.to_string(),
                    descriptor: method.descriptor(&self.pool)?.to_string(),
                });
            }
        }
        Ok(signatures)
    }

    /// Returns `true` if the verifier expects `StackMapTable` frames for this unit.
    #[must_use]
    pub fn requires_stack_maps(&self) -> bool {
        self.major_version >= STACK_MAP_MAJOR_VERSION
    }
}

fn table_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| malformed_error!("too many {} ({})", what, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{component, PACKED, POOLED};

    #[test]
    fn test_roundtrip_is_byte_exact() {
        let bytes = component("com/example/Velocity")
            .annotation(POOLED, false)
            .field("dx", "F")
            .field("dy", "D")
            .field("name", "Ljava/lang/String;")
            .default_constructor()
            .getter("getDx", "dx", "F")
            .to_bytes()
            .unwrap();

        let unit = ClassFile::read(&bytes).unwrap();
        assert_eq!(unit.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_structural_accessors() {
        let unit = component("com/example/Transform")
            .annotation(PACKED, false)
            .field("x", "F")
            .static_field("COUNT", "I")
            .default_constructor()
            .build()
            .unwrap();

        assert_eq!(unit.name().unwrap(), "com/example/Transform");
        assert_eq!(unit.super_name().unwrap(), Some("com/artemis/Component"));
        assert!(unit.find_annotation(PACKED).unwrap().is_some());
        assert!(unit.find_annotation(POOLED).unwrap().is_none());
        assert!(unit.find_method("<init>", "()V").unwrap().is_some());

        let fields = unit.fields_view().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].kind, ValueKind::Float);
        assert!(fields[1].is_static);
    }

    #[test]
    fn test_wrong_magic() {
        let err = ClassFile::read(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = component("a/B").to_bytes().unwrap();
        bytes[6] = 0x00;
        bytes[7] = 0x99;
        let err = ClassFile::read(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported class file version"));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let bytes = component("a/B").field("x", "I").to_bytes().unwrap();
        assert!(ClassFile::read(&bytes[..bytes.len() - 1]).is_err());

        let mut extended = bytes.clone();
        extended.push(0);
        assert!(ClassFile::read(&extended).is_err());
        assert!(ClassFile::read(&[]).is_err());
    }

    #[test]
    fn test_invisible_annotation_is_appended() {
        let mut unit = component("a/B").build().unwrap();
        let marker = Annotation::with_strings(&mut unit.pool, "La/Mark;", &[]).unwrap();
        unit.add_invisible_annotation(marker).unwrap();
        assert!(unit.find_annotation("La/Mark;").unwrap().is_some());

        let reread = ClassFile::read(&unit.to_bytes().unwrap()).unwrap();
        assert!(reread.find_annotation("La/Mark;").unwrap().is_some());
    }
}
