//! Read-only preview of what the weaver would do with a unit.

use crate::{
    classfile::{ClassFile, Field},
    weaver::{
        classifier, index::TypeIndex, layout, meta, PackedLayout, WeaverType, WovenMarker,
    },
    Result,
};

/// What weaving a unit would do, without doing it.
#[derive(Debug, Clone)]
pub struct UnitPreview {
    /// Internal name
    pub name: String,
    /// Direct supertype
    pub super_name: Option<String>,
    /// Classification declared by the markers
    pub declared: WeaverType,
    /// Effective classification
    pub annotation: WeaverType,
    /// The woven marker, if the unit was woven already
    pub woven: Option<WovenMarker>,
    /// Instance fields; `offset_hint` is filled in for packed units
    pub fields: Vec<Field>,
    /// The layout a packed unit would get
    pub layout: Option<PackedLayout>,
    /// Why the strategy can not be applied, if validation fails
    pub problem: Option<String>,
}

/// Scan, classify and validate `unit` and compute its packed layout, without transforming.
///
/// Validation failures are reported in [`UnitPreview::problem`] instead of failing the call.
/// Nested packed fields only validate when `index` knows their types.
///
/// # Errors
/// Returns scanning errors ([`crate::Error::AmbiguousClassification`],
/// [`crate::Error::StaleTransform`], [`crate::Error::MalformedUnit`]).
pub fn preview(unit: &ClassFile, index: &TypeIndex) -> Result<UnitPreview> {
    let metadata = meta::scan(unit)?;
    let weaver_type = classifier::classify(&metadata);

    let problem = classifier::validate(weaver_type, unit, index)
        .err()
        .map(|e| e.to_string());

    let mut fields = metadata.fields;
    let layout = if weaver_type == WeaverType::Packed {
        let layout = layout::compute(&fields);
        for field in &mut fields {
            field.offset_hint = layout.field(&field.name).map(|packed| packed.offset);
        }
        Some(layout)
    } else {
        None
    };

    Ok(UnitPreview {
        name: metadata.name,
        super_name: metadata.super_name,
        declared: metadata.declared,
        annotation: weaver_type,
        woven: metadata.woven,
        fields,
        layout,
        problem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::factories::component,
        weaver::{PACKED_MARKER, POOLED_MARKER},
    };

    #[test]
    fn test_preview_packed() {
        let unit = component("a/Transform")
            .annotation(PACKED_MARKER, false)
            .field("x", "F")
            .field("id", "J")
            .build()
            .unwrap();

        let preview = preview(&unit, &TypeIndex::new()).unwrap();
        assert_eq!(preview.annotation, WeaverType::Packed);
        assert!(preview.problem.is_none());
        let offsets: Vec<Option<u32>> = preview.fields.iter().map(|f| f.offset_hint).collect();
        assert_eq!(offsets, [Some(0), Some(8)]);
        assert_eq!(preview.layout.unwrap().stride, 16);
    }

    #[test]
    fn test_preview_reports_problem() {
        let unit = component("a/RefField")
            .annotation(PACKED_MARKER, false)
            .field("tag", "Ljava/lang/String;")
            .build()
            .unwrap();
        let preview = preview(&unit, &TypeIndex::new()).unwrap();
        assert!(preview.problem.unwrap().contains("tag"));
    }

    #[test]
    fn test_preview_pooled_has_no_layout() {
        let unit = component("a/P")
            .annotation(POOLED_MARKER, false)
            .field("hp", "I")
            .default_constructor()
            .build()
            .unwrap();
        let preview = preview(&unit, &TypeIndex::new()).unwrap();
        assert_eq!(preview.annotation, WeaverType::Pooled);
        assert!(preview.layout.is_none());
        assert!(preview.fields[0].offset_hint.is_none());
    }
}
