//! Field descriptors and the value kinds they denote (JVMS §4.3.2).

use std::fmt;

use crate::Result;

/// The value kind of a field, parsed from its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `F`
    Float,
    /// `J`
    Long,
    /// `D`
    Double,
    /// `L<internal name>;`
    Object(String),
    /// `[...`, the full array descriptor
    Array(String),
}

impl ValueKind {
    /// Parse a complete field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::MalformedUnit`] for an empty, unknown or unterminated descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let kind = match descriptor {
            "Z" => ValueKind::Boolean,
            "B" => ValueKind::Byte,
            "C" => ValueKind::Char,
            "S" => ValueKind::Short,
            "I" => ValueKind::Int,
            "F" => ValueKind::Float,
            "J" => ValueKind::Long,
            "D" => ValueKind::Double,
            d if d.starts_with('L') && d.ends_with(';') && d.len() > 2 => {
                ValueKind::Object(d[1..d.len() - 1].to_string())
            }
            d if d.starts_with('[') => {
                let element = d.trim_start_matches('[');
                ValueKind::parse(element)?;
                ValueKind::Array(d.to_string())
            }
            other => return Err(malformed_error!("invalid field descriptor '{}'", other)),
        };
        Ok(kind)
    }

    /// Returns `true` for the eight fixed-size primitive kinds.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, ValueKind::Object(_) | ValueKind::Array(_))
    }

    /// Byte size of the kind when stored in a packed buffer.
    ///
    /// References have no packed size of their own; a nested packed value is stored as its
    /// 4-byte slot index, which is what this returns for `Object`.
    #[must_use]
    pub fn packed_size(&self) -> u32 {
        match self {
            ValueKind::Boolean | ValueKind::Byte => 1,
            ValueKind::Char | ValueKind::Short => 2,
            ValueKind::Int | ValueKind::Float | ValueKind::Object(_) | ValueKind::Array(_) => 4,
            ValueKind::Long | ValueKind::Double => 8,
        }
    }

    /// Number of operand stack / local variable slots a value of this kind occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }

    /// The descriptor string of this kind.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            ValueKind::Boolean => "Z".to_string(),
            ValueKind::Byte => "B".to_string(),
            ValueKind::Char => "C".to_string(),
            ValueKind::Short => "S".to_string(),
            ValueKind::Int => "I".to_string(),
            ValueKind::Float => "F".to_string(),
            ValueKind::Long => "J".to_string(),
            ValueKind::Double => "D".to_string(),
            ValueKind::Object(name) => format!("L{name};"),
            ValueKind::Array(descriptor) => descriptor.clone(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Byte => write!(f, "byte"),
            ValueKind::Char => write!(f, "char"),
            ValueKind::Short => write!(f, "short"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::Long => write!(f, "long"),
            ValueKind::Double => write!(f, "double"),
            ValueKind::Object(name) => write!(f, "{}", name.replace('/', ".")),
            ValueKind::Array(descriptor) => write!(f, "{descriptor}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        assert_eq!(ValueKind::parse("F").unwrap(), ValueKind::Float);
        assert_eq!(ValueKind::parse("J").unwrap().packed_size(), 8);
        assert_eq!(ValueKind::parse("Z").unwrap().packed_size(), 1);
        assert_eq!(ValueKind::parse("D").unwrap().slots(), 2);
        assert!(ValueKind::Char.is_primitive());
    }

    #[test]
    fn test_references() {
        let string = ValueKind::parse("Ljava/lang/String;").unwrap();
        assert_eq!(string, ValueKind::Object("java/lang/String".into()));
        assert!(!string.is_primitive());
        assert_eq!(string.to_string(), "java.lang.String");
        assert_eq!(string.descriptor(), "Ljava/lang/String;");

        let array = ValueKind::parse("[[I").unwrap();
        assert_eq!(array, ValueKind::Array("[[I".into()));
    }

    #[test]
    fn test_invalid() {
        assert!(ValueKind::parse("").is_err());
        assert!(ValueKind::parse("Q").is_err());
        assert!(ValueKind::parse("Ljava/lang/String").is_err());
        assert!(ValueKind::parse("[").is_err());
        assert!(ValueKind::parse("L;").is_err());
    }
}
