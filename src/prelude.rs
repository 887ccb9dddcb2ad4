//! # weavescope Prelude
//!
//! Convenient imports for the most commonly used types. Import this module to weave a
//! build or inspect a class file without spelling out module paths.
//!
//! ```rust
//! use weavescope::prelude::*;
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all weavescope operations
pub use crate::Error;

/// Closed classification of errors, as found in failure reports
pub use crate::ErrorKind;

/// The result type used throughout weavescope
pub use crate::Result;

// ================================================================================================
// Class Files
// ================================================================================================

/// Read and write compiled units
pub use crate::classfile::{ClassFile, Field};

/// Synthesize compiled units
pub use crate::classfile::builder::ClassBuilder;

/// Value kinds of fields
pub use crate::classfile::descriptor::ValueKind;

// ================================================================================================
// Weaving
// ================================================================================================

/// Strategy selection, configuration and results
pub use crate::weaver::{
    preview, PackedLayout, TransformResult, TypeIndex, UnitPreview, WeaverConfig, WeaverType,
};

/// Whole-build weaving
pub use crate::project::{
    CancellationFlag, DirectorySource, MemorySource, SourceSet, UnitFailure, WeaveReport, Weaver,
};

// ================================================================================================
// Runtime
// ================================================================================================

/// System lifecycle and entity identity
pub use crate::ecs::{BaseSystem, Entity, IdentityManager, Process, SystemState};
