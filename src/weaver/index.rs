//! The whole-set index: every unit of a run, by name, with its declared classification.
//!
//! The index is built sequentially before any pipeline starts and is shared read-only
//! (behind an `Arc`) by all of them. It answers two questions during validation and
//! transformation: does a referenced type exist in the source set, and is a field's type
//! itself a packed component.

use std::collections::HashMap;

use crate::{
    classfile::ClassFile,
    weaver::{meta, WeaverType},
    Result,
};

/// Read-only mapping from internal type name to declared classification.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    entries: HashMap<String, WeaverType>,
}

impl TypeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index by scanning every unit.
    ///
    /// # Errors
    /// Returns the first scanning error; see [`meta::scan`].
    pub fn from_units<'a, I>(units: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a ClassFile>,
    {
        let mut index = TypeIndex::new();
        for unit in units {
            let metadata = meta::scan(unit)?;
            index.insert(metadata.name, metadata.declared);
        }
        Ok(index)
    }

    /// Record a type. A later insert for the same name replaces the earlier one.
    pub fn insert(&mut self, name: impl Into<String>, declared: WeaverType) {
        self.entries.insert(name.into(), declared);
    }

    /// Returns `true` if `name` is part of the source set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Declared classification of `name`, if indexed.
    #[must_use]
    pub fn classification(&self, name: &str) -> Option<WeaverType> {
        self.entries.get(name).copied()
    }

    /// Returns `true` if `name` is indexed and declared packed.
    #[must_use]
    pub fn is_packed(&self, name: &str) -> bool {
        self.classification(name) == Some(WeaverType::Packed)
    }

    /// Number of indexed types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
