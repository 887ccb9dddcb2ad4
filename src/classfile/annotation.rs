//! Class-level annotations (JVMS §4.7.16).
//!
//! Annotations are kept in their constant-pool-indexed form so that an untouched attribute is
//! written back byte-for-byte; the resolving helpers take the owning [`ConstantPool`].

use crate::{
    classfile::constpool::{Constant, ConstantPool},
    file::{io::write_be, parser::Parser},
    Result,
};

/// A single `annotation` structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Index of the `Utf8` field descriptor of the annotation type
    pub type_index: u16,
    /// `(element_name_index, value)` pairs
    pub elements: Vec<(u16, ElementValue)>,
}

/// An `element_value` structure.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant: tag (`B C D F I J S Z s`) and constant index
    Const {
        /// The element tag character
        tag: u8,
        /// Index of the constant value
        index: u16,
    },
    /// Enum constant: type descriptor index, constant name index
    Enum {
        /// Index of the enum type descriptor
        type_index: u16,
        /// Index of the constant's simple name
        name_index: u16,
    },
    /// Class literal: return descriptor index
    Class(u16),
    /// Nested annotation
    Annotation(Annotation),
    /// Array of values
    Array(Vec<ElementValue>),
}

impl Annotation {
    /// Parse one annotation.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on an unknown element tag or truncation.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        let type_index = parser.read_be::<u16>()?;
        let elements = parser.read_table(|p| {
            let name = p.read_be::<u16>()?;
            Ok((name, ElementValue::read(p)?))
        })?;
        Ok(Annotation {
            type_index,
            elements,
        })
    }

    /// Parse a `num_annotations`-prefixed list, as stored in the annotation attributes.
    ///
    /// # Errors
    /// See [`Annotation::read`].
    pub fn read_list(data: &[u8]) -> Result<Vec<Self>> {
        let mut parser = Parser::new(data);
        let annotations = parser.read_table(Annotation::read)?;
        if parser.has_more_data() {
            return Err(malformed_error!("trailing bytes after annotation list"));
        }
        Ok(annotations)
    }

    /// Serialize this annotation.
    pub fn write(&self, out: &mut Vec<u8>) {
        write_be(out, self.type_index);
        write_be(out, len_u16(self.elements.len()));
        for (name, value) in &self.elements {
            write_be(out, *name);
            value.write(out);
        }
    }

    /// Serialize a list with its `num_annotations` prefix.
    pub fn write_list(annotations: &[Annotation], out: &mut Vec<u8>) {
        write_be(out, len_u16(annotations.len()));
        for annotation in annotations {
            annotation.write(out);
        }
    }

    /// The annotation type descriptor, e.g. `Lcom/artemis/annotations/PooledWeaver;`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the index does not resolve to a `Utf8`.
    pub fn type_descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.type_index)
    }

    /// Look up the value of the element called `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if an element name does not resolve.
    pub fn element<'s>(
        &'s self,
        name: &str,
        pool: &ConstantPool,
    ) -> Result<Option<&'s ElementValue>> {
        for (name_index, value) in &self.elements {
            if pool.utf8(*name_index)? == name {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Resolve a string-valued element (`tag == 's'`).
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the element does not resolve.
    pub fn string_element<'a>(
        &self,
        name: &str,
        pool: &'a ConstantPool,
    ) -> Result<Option<&'a str>> {
        match self.element(name, pool)? {
            Some(ElementValue::Const { tag: b's', index }) => Ok(Some(pool.utf8(*index)?)),
            _ => Ok(None),
        }
    }

    /// Build an annotation with string-valued elements, interning every name and value.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the constant pool overflows.
    pub fn with_strings(
        pool: &mut ConstantPool,
        descriptor: &str,
        elements: &[(&str, &str)],
    ) -> Result<Self> {
        let type_index = pool.intern_utf8(descriptor)?;
        let mut values = Vec::with_capacity(elements.len());
        for (name, value) in elements {
            let name_index = pool.intern_utf8(name)?;
            let value_index = pool.intern(Constant::Utf8((*value).to_string()))?;
            values.push((
                name_index,
                ElementValue::Const {
                    tag: b's',
                    index: value_index,
                },
            ));
        }
        Ok(Annotation {
            type_index,
            elements: values,
        })
    }
}

impl ElementValue {
    /// Parse one element value.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on an unknown tag or truncation.
    pub fn read(parser: &mut Parser) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        let value = match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
                tag,
                index: parser.read_be()?,
            },
            b'e' => ElementValue::Enum {
                type_index: parser.read_be()?,
                name_index: parser.read_be()?,
            },
            b'c' => ElementValue::Class(parser.read_be()?),
            b'@' => ElementValue::Annotation(Annotation::read(parser)?),
            b'[' => ElementValue::Array(parser.read_table(ElementValue::read)?),
            other => return Err(malformed_error!("unknown element value tag 0x{:02x}", other)),
        };
        Ok(value)
    }

    /// Serialize this element value.
    pub fn write(&self, out: &mut Vec<u8>) {
        match self {
            ElementValue::Const { tag, index } => {
                out.push(*tag);
                write_be(out, *index);
            }
            ElementValue::Enum {
                type_index,
                name_index,
            } => {
                out.push(b'e');
                write_be(out, *type_index);
                write_be(out, *name_index);
            }
            ElementValue::Class(index) => {
                out.push(b'c');
                write_be(out, *index);
            }
            ElementValue::Annotation(annotation) => {
                out.push(b'@');
                annotation.write(out);
            }
            ElementValue::Array(values) => {
                out.push(b'[');
                write_be(out, len_u16(values.len()));
                for value in values {
                    value.write(out);
                }
            }
        }
    }
}

// Lengths come from u16-prefixed tables or from the weaver appending a handful of entries.
#[allow(clippy::cast_possible_truncation)]
fn len_u16(len: usize) -> u16 {
    len as u16
}
