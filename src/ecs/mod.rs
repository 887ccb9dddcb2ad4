//! Runtime collaborators of woven components.
//!
//! Weaving changes how components are stored, but the runtime that drives them stays the
//! same. This module holds the two pieces of that runtime the woven code relies on:
//!
//! - [`system::BaseSystem`] - The lifecycle contract every system follows
//! - [`identity::IdentityManager`] - Stable external identifiers for entities

pub mod identity;
pub mod system;

pub use identity::IdentityManager;
pub use system::{BaseSystem, Process, SystemState};

use std::fmt;

/// An entity id, the slot index of a live entity in its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    /// Create an entity handle from its id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The numeric id.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl From<u32> for Entity {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity[{}]", self.0)
    }
}
