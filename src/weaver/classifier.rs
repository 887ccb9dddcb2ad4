//! Classification and precondition checks.
//!
//! [`classify`] is total: every [`ClassMetadata`] maps to exactly one [`WeaverType`]
//! (conflicting markers are rejected earlier, by the scanner). [`validate`] then checks
//! that the selected strategy can be applied to the unit at all.

use crate::{
    classfile::{descriptor::ValueKind, ClassFile},
    weaver::{index::TypeIndex, meta::ClassMetadata, WeaverType, PACKED_COMPONENT},
    Error, Result,
};

/// The effective classification of a scanned unit.
#[must_use]
pub fn classify(metadata: &ClassMetadata) -> WeaverType {
    metadata.annotation
}

/// Check the preconditions of `weaver_type` on `unit`.
///
/// # Errors
/// - [`Error::AlreadyPacked`] if a packed unit already extends the packed base type
/// - [`Error::UnpackableField`] naming the first instance field of a packed unit that is
///   neither a fixed-size primitive nor a packed component from the index
/// - [`Error::MissingDefaultConstructor`] if a pooled unit lacks `<init>()V`
pub fn validate(weaver_type: WeaverType, unit: &ClassFile, index: &TypeIndex) -> Result<()> {
    let name = unit.name()?;
    match weaver_type {
        WeaverType::None => Ok(()),
        WeaverType::Pooled => {
            if unit.find_method("<init>", "()V")?.is_none() {
                return Err(Error::MissingDefaultConstructor(name.to_string()));
            }
            Ok(())
        }
        WeaverType::Packed => {
            if unit.super_name()? == Some(PACKED_COMPONENT) {
                return Err(Error::AlreadyPacked(name.to_string()));
            }
            for field in unit.fields_view()?.iter().filter(|f| !f.is_static) {
                if !is_packable(&field.kind, name, index) {
                    return Err(Error::UnpackableField(field.name.clone()));
                }
            }
            Ok(())
        }
    }
}

/// A value kind can live in a packed buffer if it has a fixed size: a primitive, or a
/// reference to another packed component (stored as that component's slot index).
fn is_packable(kind: &ValueKind, owner: &str, index: &TypeIndex) -> bool {
    match kind {
        ValueKind::Object(name) => name != owner && index.is_packed(name),
        ValueKind::Array(_) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::factories::component,
        weaver::{meta::scan, PACKED_MARKER, POOLED_MARKER},
    };

    #[test]
    fn test_classify_total() {
        for (marker, expected) in [
            (None, WeaverType::None),
            (Some(POOLED_MARKER), WeaverType::Pooled),
            (Some(PACKED_MARKER), WeaverType::Packed),
        ] {
            let mut builder = component("a/T");
            if let Some(marker) = marker {
                builder = builder.annotation(marker, false);
            }
            let meta = scan(&builder.build().unwrap()).unwrap();
            assert_eq!(classify(&meta), expected);
        }
    }

    #[test]
    fn test_validate_packed_fields() {
        let index = {
            let mut index = TypeIndex::new();
            index.insert("com/example/Vec3", WeaverType::Packed);
            index.insert("com/example/Name", WeaverType::Pooled);
            index
        };

        let ok = component("com/example/Body")
            .field("mass", "F")
            .field("alive", "Z")
            .field("id", "J")
            .field("position", "Lcom/example/Vec3;")
            .build()
            .unwrap();
        validate(WeaverType::Packed, &ok, &index).unwrap();

        for (name, descriptor) in [
            ("tag", "Ljava/lang/String;"),
            ("name", "Lcom/example/Name;"),
            ("samples", "[F"),
        ] {
            let unit = component("com/example/Body")
                .field("mass", "F")
                .field(name, descriptor)
                .build()
                .unwrap();
            match validate(WeaverType::Packed, &unit, &index) {
                Err(Error::UnpackableField(field)) => assert_eq!(field, name),
                other => panic!("expected UnpackableField({name}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_static_fields_ignored() {
        let unit = component("a/T")
            .field("x", "F")
            .static_field("NAME", "Ljava/lang/String;")
            .build()
            .unwrap();
        validate(WeaverType::Packed, &unit, &TypeIndex::new()).unwrap();
    }

    #[test]
    fn test_validate_self_reference_not_packable() {
        let mut index = TypeIndex::new();
        index.insert("a/Node", WeaverType::Packed);
        let unit = component("a/Node").field("next", "La/Node;").build().unwrap();
        assert!(matches!(
            validate(WeaverType::Packed, &unit, &index),
            Err(Error::UnpackableField(_))
        ));
    }

    #[test]
    fn test_validate_already_packed() {
        let unit = component("a/T")
            .super_class(PACKED_COMPONENT)
            .field("x", "F")
            .build()
            .unwrap();
        assert!(matches!(
            validate(WeaverType::Packed, &unit, &TypeIndex::new()),
            Err(Error::AlreadyPacked(name)) if name == "a/T"
        ));
    }

    #[test]
    fn test_validate_pooled_constructor() {
        let with = component("a/P").default_constructor().build().unwrap();
        validate(WeaverType::Pooled, &with, &TypeIndex::new()).unwrap();

        let without = component("a/P")
            .field("hp", "I")
            .field_constructor("hp", "I")
            .build()
            .unwrap();
        match validate(WeaverType::Pooled, &without, &TypeIndex::new()) {
            Err(Error::MissingDefaultConstructor(name)) => assert_eq!(name, "a/P"),
            other => panic!("expected MissingDefaultConstructor, got {other:?}"),
        }
        validate(WeaverType::None, &without, &TypeIndex::new()).unwrap();
    }
}
