//! Metadata scanning: one read-only pass over a unit's markers, fields and methods.

use std::fmt::Write;

use sha1::{Digest, Sha1};

use crate::{
    classfile::{ClassFile, Field},
    weaver::{WeaverType, PACKED_MARKER, POOLED_MARKER, WOVEN_MARKER},
    Error, Result,
};

/// Name of the woven marker element recording the applied strategy.
pub const STRATEGY_ELEMENT: &str = "strategy";
/// Name of the woven marker element recording the field table fingerprint.
pub const FINGERPRINT_ELEMENT: &str = "fingerprint";

/// The decoded "already woven" marker.
///
/// Both elements are optional: a marker written by another weaver carries neither and is
/// trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WovenMarker {
    /// The strategy applied when the unit was woven
    pub strategy: Option<WeaverType>,
    /// SHA-1 of the instance field table right after weaving
    pub fingerprint: Option<String>,
}

/// Everything the classifier and transformer need to know about a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetadata {
    /// Internal name of the unit
    pub name: String,
    /// Direct supertype
    pub super_name: Option<String>,
    /// Classification declared by the markers alone
    pub declared: WeaverType,
    /// Effective classification: [`WeaverType::None`] once woven
    pub annotation: WeaverType,
    /// The woven marker, if present
    pub woven: Option<WovenMarker>,
    /// Instance fields in declaration order
    pub fields: Vec<Field>,
    /// The unit declares `<init>()V`
    pub has_default_constructor: bool,
    /// The unit declares `reset()V`
    pub has_reset: bool,
}

/// Scan a unit.
///
/// Markers are matched in a fixed order, pooled before packed. A unit carrying the woven
/// marker is classified [`WeaverType::None`] so that re-running the weaver is a no-op,
/// unless its declaration drifted since weaving.
///
/// # Errors
/// - [`Error::AmbiguousClassification`] if both classification markers are present
/// - [`Error::StaleTransform`] if a woven unit's declared marker or field table no longer
///   matches what the woven marker recorded
/// - [`Error::MalformedUnit`] if a name or descriptor does not resolve
pub fn scan(unit: &ClassFile) -> Result<ClassMetadata> {
    let name = unit.name()?.to_string();
    let declared = declared_type(unit)?;
    let woven = woven_marker(unit)?;

    let annotation = match &woven {
        None => declared,
        Some(marker) => {
            if let Some(strategy) = marker.strategy {
                if strategy != declared {
                    return Err(Error::StaleTransform {
                        name,
                        reason: format!(
                            "declared {} but woven as {}",
                            declared.label(),
                            strategy.label()
                        ),
                    });
                }
            }
            if let Some(recorded) = &marker.fingerprint {
                let current = fingerprint(unit)?;
                if *recorded != current {
                    return Err(Error::StaleTransform {
                        name,
                        reason: format!(
                            "field table changed since weaving ({recorded} != {current})"
                        ),
                    });
                }
            }
            WeaverType::None
        }
    };

    let fields = unit
        .fields_view()?
        .into_iter()
        .filter(|field| !field.is_static)
        .collect();

    Ok(ClassMetadata {
        super_name: unit.super_name()?.map(str::to_string),
        declared,
        annotation,
        woven,
        fields,
        has_default_constructor: unit.find_method("<init>", "()V")?.is_some(),
        has_reset: unit.find_method("reset", "()V")?.is_some(),
        name,
    })
}

/// Fingerprint of the instance field table: SHA-1 over `name:descriptor` lines in
/// declaration order, as lowercase hex.
///
/// # Errors
/// Returns [`Error::MalformedUnit`] if a field name or descriptor does not resolve.
pub fn fingerprint(unit: &ClassFile) -> Result<String> {
    let mut hasher = Sha1::new();
    for field in unit.fields.iter().filter(|f| f.is_instance()) {
        hasher.update(field.name(&unit.pool)?.as_bytes());
        hasher.update(b":");
        hasher.update(field.descriptor(&unit.pool)?.as_bytes());
        hasher.update(b"\n");
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

fn declared_type(unit: &ClassFile) -> Result<WeaverType> {
    let mut found: Option<WeaverType> = None;
    for (weaver_type, marker) in [
        (WeaverType::Pooled, POOLED_MARKER),
        (WeaverType::Packed, PACKED_MARKER),
    ] {
        if unit.find_annotation(marker)?.is_none() {
            continue;
        }
        if let Some(first) = found {
            return Err(Error::AmbiguousClassification {
                first: first.label().to_string(),
                second: weaver_type.label().to_string(),
            });
        }
        found = Some(weaver_type);
    }
    Ok(found.unwrap_or(WeaverType::None))
}

fn woven_marker(unit: &ClassFile) -> Result<Option<WovenMarker>> {
    let Some(annotation) = unit.find_annotation(WOVEN_MARKER)? else {
        return Ok(None);
    };

    let strategy = match annotation.string_element(STRATEGY_ELEMENT, &unit.pool)? {
        Some(value) => Some(value.parse::<WeaverType>().map_err(|_| {
            malformed_error!("woven marker records unknown strategy '{}'", value)
        })?),
        None => None,
    };
    let fingerprint = annotation
        .string_element(FINGERPRINT_ELEMENT, &unit.pool)?
        .map(str::to_string);

    Ok(Some(WovenMarker {
        strategy,
        fingerprint,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::component;

    #[test]
    fn test_scan_unmarked() {
        let unit = component("com/example/Position")
            .field("x", "F")
            .static_field("ORIGIN", "I")
            .default_constructor()
            .build()
            .unwrap();

        let meta = scan(&unit).unwrap();
        assert_eq!(meta.name, "com/example/Position");
        assert_eq!(meta.annotation, WeaverType::None);
        assert_eq!(meta.super_name.as_deref(), Some("com/artemis/Component"));
        assert_eq!(meta.fields.len(), 1);
        assert!(meta.has_default_constructor);
        assert!(!meta.has_reset);
        assert!(meta.woven.is_none());
    }

    #[test]
    fn test_scan_markers() {
        let pooled = component("a/P").annotation(POOLED_MARKER, false).build().unwrap();
        let packed = component("a/Q").annotation(PACKED_MARKER, true).build().unwrap();
        assert_eq!(scan(&pooled).unwrap().annotation, WeaverType::Pooled);
        assert_eq!(scan(&packed).unwrap().annotation, WeaverType::Packed);
    }

    #[test]
    fn test_scan_ambiguous() {
        let unit = component("a/Bad")
            .annotation(PACKED_MARKER, false)
            .annotation(POOLED_MARKER, false)
            .build()
            .unwrap();

        match scan(&unit) {
            Err(Error::AmbiguousClassification { first, second }) => {
                assert_eq!((first.as_str(), second.as_str()), ("pooled", "packed"));
            }
            other => panic!("expected AmbiguousClassification, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_woven_is_none() {
        let mut unit = component("a/W")
            .annotation(POOLED_MARKER, false)
            .field("hp", "I")
            .build()
            .unwrap();
        let print = fingerprint(&unit).unwrap();
        let marker = crate::classfile::annotation::Annotation::with_strings(
            &mut unit.pool,
            WOVEN_MARKER,
            &[(STRATEGY_ELEMENT, "POOLED"), (FINGERPRINT_ELEMENT, &print)],
        )
        .unwrap();
        unit.add_invisible_annotation(marker).unwrap();

        let meta = scan(&unit).unwrap();
        assert_eq!(meta.declared, WeaverType::Pooled);
        assert_eq!(meta.annotation, WeaverType::None);
        assert_eq!(meta.woven.unwrap().strategy, Some(WeaverType::Pooled));
    }

    #[test]
    fn test_scan_foreign_woven_marker_is_trusted() {
        let unit = component("a/W")
            .annotation(PACKED_MARKER, false)
            .annotation(WOVEN_MARKER, false)
            .build()
            .unwrap();
        assert_eq!(scan(&unit).unwrap().annotation, WeaverType::None);
    }

    #[test]
    fn test_scan_stale_strategy() {
        let unit = component("a/S")
            .annotation(PACKED_MARKER, false)
            .annotation_with(WOVEN_MARKER, false, &[(STRATEGY_ELEMENT, "POOLED")])
            .build()
            .unwrap();
        match scan(&unit) {
            Err(Error::StaleTransform { name, reason }) => {
                assert_eq!(name, "a/S");
                assert!(reason.contains("declared packed but woven as pooled"));
            }
            other => panic!("expected StaleTransform, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_stale_fingerprint() {
        let unit = component("a/S")
            .annotation(POOLED_MARKER, false)
            .annotation_with(
                WOVEN_MARKER,
                false,
                &[(STRATEGY_ELEMENT, "POOLED"), (FINGERPRINT_ELEMENT, "0000")],
            )
            .field("added", "I")
            .build()
            .unwrap();
        assert!(matches!(scan(&unit), Err(Error::StaleTransform { .. })));
    }

    #[test]
    fn test_fingerprint_tracks_order() {
        let ab = component("a/F").field("a", "I").field("b", "I").build().unwrap();
        let ba = component("a/F").field("b", "I").field("a", "I").build().unwrap();
        let ab_static = component("a/F")
            .field("a", "I")
            .static_field("s", "J")
            .field("b", "I")
            .build()
            .unwrap();

        let print = fingerprint(&ab).unwrap();
        assert_eq!(print.len(), 40);
        assert_ne!(print, fingerprint(&ba).unwrap());
        assert_eq!(print, fingerprint(&ab_static).unwrap());
    }
}
