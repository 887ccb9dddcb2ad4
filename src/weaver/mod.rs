//! Component weaving: classification and structural rewriting of compiled units.
//!
//! A unit flows through the weaver in four steps:
//!
//! 1. [`meta::scan`] extracts its [`meta::ClassMetadata`] in one read-only pass
//! 2. [`classifier::classify`] turns the metadata into a [`WeaverType`]
//! 3. [`classifier::validate`] checks the strategy's preconditions
//! 4. [`transform::transform`] applies the strategy and serializes the result
//!
//! The strategies themselves live in [`pooled`] and [`packed`]; [`layout`] computes the
//! deterministic byte layout a packed unit is stored with. Cross-unit questions (does a
//! referenced type exist, is a field type itself packed) are answered by the read-only
//! [`index::TypeIndex`] built once per run.
//!
//! # Examples
//!
//! ```rust
//! use weavescope::classfile::builder::ClassBuilder;
//! use weavescope::weaver::{self, TypeIndex, WeaverConfig, WeaverType, PACKED_MARKER};
//!
//! let unit = ClassBuilder::new("com/example/Transform")
//!     .super_class("com/artemis/Component")
//!     .annotation(PACKED_MARKER, false)
//!     .field("x", "F")
//!     .field("y", "F")
//!     .field("z", "F")
//!     .default_constructor()
//!     .build()?;
//!
//! let index = TypeIndex::from_units([&unit])?;
//! let result = weaver::weave(unit, &index, &WeaverConfig::default())?.unwrap();
//!
//! assert_eq!(result.annotation, WeaverType::Packed);
//! let offsets: Vec<u32> = result.layout.unwrap().fields.iter().map(|f| f.offset).collect();
//! assert_eq!(offsets, [0, 4, 8]);
//! # Ok::<(), weavescope::Error>(())
//! ```

pub mod classifier;
pub mod config;
pub mod index;
pub mod layout;
pub mod meta;
pub mod packed;
pub mod pooled;
pub mod preview;
pub mod transform;

pub use config::WeaverConfig;
pub use index::TypeIndex;
pub use layout::{PackedField, PackedLayout};
pub use meta::{scan, ClassMetadata, WovenMarker};
pub use preview::{preview, UnitPreview};
pub use transform::transform;

use strum::{Display, EnumIter, EnumString};

use crate::{classfile::ClassFile, Result};

/// Marker annotation selecting the pooled strategy.
pub const POOLED_MARKER: &str = "Lcom/artemis/annotations/PooledWeaver;";
/// Marker annotation selecting the packed strategy.
pub const PACKED_MARKER: &str = "Lcom/artemis/annotations/PackedWeaver;";
/// Marker annotation written into every woven unit.
pub const WOVEN_MARKER: &str = "Lcom/artemis/annotations/internal/Transmuted;";

/// Plain component base type.
pub const COMPONENT: &str = "com/artemis/Component";
/// Base type of pooled components.
pub const POOLED_COMPONENT: &str = "com/artemis/PooledComponent";
/// Base type of packed components.
pub const PACKED_COMPONENT: &str = "com/artemis/PackedComponent";

/// The weaving strategy selected for a unit.
///
/// The marker checks run in declaration order of this enum's non-`None` variants: pooled
/// first, then packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum WeaverType {
    /// Leave the unit untouched
    None,
    /// Reset-and-reuse instances
    Pooled,
    /// Store fields in a shared, slot-indexed byte buffer
    Packed,
}

impl WeaverType {
    /// The marker annotation that declares this strategy, `None` for [`WeaverType::None`].
    #[must_use]
    pub fn marker(self) -> Option<&'static str> {
        match self {
            WeaverType::None => None,
            WeaverType::Pooled => Some(POOLED_MARKER),
            WeaverType::Packed => Some(PACKED_MARKER),
        }
    }

    /// Lowercase name used in diagnostics, e.g. `pooled`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            WeaverType::None => "none",
            WeaverType::Pooled => "pooled",
            WeaverType::Packed => "packed",
        }
    }
}

/// A woven unit, ready to be written back under its name.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Internal name of the unit
    pub name: String,
    /// The strategy that was applied
    pub annotation: WeaverType,
    /// The rewritten unit
    pub unit: ClassFile,
    /// Its serialized form
    pub bytes: Vec<u8>,
    /// The packed layout, for [`WeaverType::Packed`] units
    pub layout: Option<PackedLayout>,
}

/// Run the whole per-unit pipeline after reading: scan, classify, validate and transform.
///
/// Returns `Ok(None)` for units classified [`WeaverType::None`], which must be left
/// untouched.
///
/// # Errors
/// Returns the first error of the pipeline: [`crate::Error::AmbiguousClassification`] or
/// [`crate::Error::StaleTransform`] from scanning, a validation error, or a transformation
/// error.
pub fn weave(
    unit: ClassFile,
    index: &TypeIndex,
    config: &WeaverConfig,
) -> Result<Option<TransformResult>> {
    let metadata = meta::scan(&unit)?;
    let weaver_type = classifier::classify(&metadata);
    if weaver_type == WeaverType::None {
        log::debug!("{}: no weaving required", metadata.name);
        return Ok(None);
    }

    classifier::validate(weaver_type, &unit, index)?;
    transform::transform(unit, weaver_type, index, config).map(Some)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_weaver_type_strings() {
        assert_eq!(WeaverType::Pooled.to_string(), "POOLED");
        assert_eq!(WeaverType::from_str("PACKED").unwrap(), WeaverType::Packed);
        assert_eq!(WeaverType::iter().count(), 3);
        assert_eq!(WeaverType::None.marker(), None);
        assert_eq!(WeaverType::Packed.marker(), Some(PACKED_MARKER));
    }
}
