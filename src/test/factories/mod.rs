//! Class-file factories for the unit tests.

use crate::{
    classfile::builder::ClassBuilder,
    weaver::{COMPONENT, PACKED_MARKER, POOLED_MARKER},
};

/// Marker descriptor selecting the pooled strategy.
pub const POOLED: &str = POOLED_MARKER;
/// Marker descriptor selecting the packed strategy.
pub const PACKED: &str = PACKED_MARKER;

/// A builder for a component extending the plain component base.
pub fn component(name: &str) -> ClassBuilder {
    ClassBuilder::new(name).super_class(COMPONENT)
}

