//! Attributes attached to classes, fields, methods and code (JVMS §4.7).
//!
//! Only the attributes the weaver reads or rewrites are decoded: `Code` and the two class
//! annotation attributes. Everything else is carried as opaque bytes and written back
//! unchanged.

use crate::{
    classfile::{annotation::Annotation, constpool::ConstantPool},
    file::{io::write_be, parser::Parser},
    Result,
};

/// Name of the method body attribute.
pub const CODE: &str = "Code";
/// Name of the attribute holding runtime-visible annotations.
pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
/// Name of the attribute holding class-retention annotations.
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
/// Name of the static-field initializer attribute.
pub const CONSTANT_VALUE: &str = "ConstantValue";
/// Name of the verifier frame attribute.
pub const STACK_MAP_TABLE: &str = "StackMapTable";

/// One attribute: its name index and decoded (or opaque) payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Index of the `Utf8` attribute name
    pub name_index: u16,
    /// Payload
    pub data: AttributeData,
}

/// Payload of an [`Attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// A method body
    Code(CodeAttribute),
    /// `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`
    Annotations(Vec<Annotation>),
    /// Any other attribute, untouched
    Raw(Vec<u8>),
}

/// The `Code` attribute of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    /// Maximum operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// The bytecode
    pub code: Vec<u8>,
    /// Exception handler table
    pub exception_table: Vec<ExceptionEntry>,
    /// Nested attributes (`StackMapTable`, `LineNumberTable`, ...)
    pub attributes: Vec<Attribute>,
}

/// One row of a method's exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    /// Start of the protected range (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Handler offset
    pub handler_pc: u16,
    /// Caught class index, 0 for `finally`
    pub catch_type: u16,
}

impl Attribute {
    /// Parse one attribute, decoding the kinds the weaver understands.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] on truncation or an unresolvable name.
    pub fn read(parser: &mut Parser, pool: &ConstantPool) -> Result<Self> {
        let name_index = parser.read_be::<u16>()?;
        let length = parser.read_be::<u32>()?;
        let length = usize::try_from(length)
            .map_err(|_| malformed_error!("attribute length {} does not fit", length))?;
        let payload = parser.read_bytes(length)?;

        let data = match pool.utf8(name_index)? {
            CODE => AttributeData::Code(CodeAttribute::read(payload, pool)?),
            RUNTIME_VISIBLE_ANNOTATIONS | RUNTIME_INVISIBLE_ANNOTATIONS => {
                AttributeData::Annotations(Annotation::read_list(payload)?)
            }
            _ => AttributeData::Raw(payload.to_vec()),
        };

        Ok(Attribute { name_index, data })
    }

    /// Parse a `u16`-counted attribute table.
    ///
    /// # Errors
    /// See [`Attribute::read`].
    pub fn read_table(parser: &mut Parser, pool: &ConstantPool) -> Result<Vec<Self>> {
        parser.read_table(|p| Attribute::read(p, pool))
    }

    /// Serialize this attribute with its name index and length header.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the payload exceeds `u32::MAX` bytes.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut payload = Vec::new();
        match &self.data {
            AttributeData::Code(code) => code.write(&mut payload)?,
            AttributeData::Annotations(annotations) => {
                Annotation::write_list(annotations, &mut payload);
            }
            AttributeData::Raw(bytes) => payload.extend_from_slice(bytes),
        }

        let length = u32::try_from(payload.len())
            .map_err(|_| malformed_error!("attribute payload too large"))?;
        write_be(out, self.name_index);
        write_be(out, length);
        out.extend_from_slice(&payload);
        Ok(())
    }

    /// Serialize a `u16`-counted attribute table.
    ///
    /// # Errors
    /// See [`Attribute::write`].
    pub fn write_table(attributes: &[Attribute], out: &mut Vec<u8>) -> Result<()> {
        let count = u16::try_from(attributes.len())
            .map_err(|_| malformed_error!("too many attributes"))?;
        write_be(out, count);
        for attribute in attributes {
            attribute.write(out)?;
        }
        Ok(())
    }

    /// Resolve the attribute name.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] if the name index does not resolve.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }
}

impl CodeAttribute {
    /// Create an empty body with the given limits.
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn read(data: &[u8], pool: &ConstantPool) -> Result<Self> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;
        let code_length = parser.read_be::<u32>()?;
        if code_length == 0 || code_length >= 65536 {
            return Err(malformed_error!("invalid code length {}", code_length));
        }
        let code = parser.read_bytes(code_length as usize)?.to_vec();
        let exception_table = parser.read_table(|p| {
            Ok(ExceptionEntry {
                start_pc: p.read_be()?,
                end_pc: p.read_be()?,
                handler_pc: p.read_be()?,
                catch_type: p.read_be()?,
            })
        })?;
        let attributes = Attribute::read_table(&mut parser, pool)?;
        if parser.has_more_data() {
            return Err(malformed_error!("trailing bytes in Code attribute"));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_be(out, self.max_stack);
        write_be(out, self.max_locals);
        let code_length =
            u32::try_from(self.code.len()).map_err(|_| malformed_error!("code too large"))?;
        write_be(out, code_length);
        out.extend_from_slice(&self.code);

        let handlers = u16::try_from(self.exception_table.len())
            .map_err(|_| malformed_error!("too many exception handlers"))?;
        write_be(out, handlers);
        for entry in &self.exception_table {
            write_be(out, entry.start_pc);
            write_be(out, entry.end_pc);
            write_be(out, entry.handler_pc);
            write_be(out, entry.catch_type);
        }

        Attribute::write_table(&self.attributes, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_keeps_nested_raw() {
        let mut pool = ConstantPool::new();
        let code_name = pool.intern_utf8(CODE).unwrap();
        let lines = pool.intern_utf8("LineNumberTable").unwrap();

        let mut body = CodeAttribute::new(1, 1, vec![0x2a, 0xb1]);
        body.attributes.push(Attribute {
            name_index: lines,
            data: AttributeData::Raw(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07]),
        });
        let attribute = Attribute {
            name_index: code_name,
            data: AttributeData::Code(body),
        };

        let mut out = Vec::new();
        attribute.write(&mut out).unwrap();
        let mut parser = Parser::new(&out);
        let reread = Attribute::read(&mut parser, &pool).unwrap();
        assert_eq!(reread, attribute);
        assert_eq!(reread.name(&pool).unwrap(), CODE);
    }

    #[test]
    fn test_unknown_attribute_is_opaque() {
        let mut pool = ConstantPool::new();
        let name = pool.intern_utf8("Custom").unwrap();
        let mut out = Vec::new();
        write_be(&mut out, name);
        write_be(&mut out, 3_u32);
        out.extend_from_slice(&[1, 2, 3]);

        let mut parser = Parser::new(&out);
        let attribute = Attribute::read(&mut parser, &pool).unwrap();
        assert_eq!(attribute.data, AttributeData::Raw(vec![1, 2, 3]));
    }

    #[test]
    fn test_truncated_payload() {
        let mut pool = ConstantPool::new();
        let name = pool.intern_utf8("Custom").unwrap();
        let mut out = Vec::new();
        write_be(&mut out, name);
        write_be(&mut out, 10_u32);
        out.extend_from_slice(&[1, 2, 3]);

        let mut parser = Parser::new(&out);
        assert!(Attribute::read(&mut parser, &pool).is_err());
    }
}
