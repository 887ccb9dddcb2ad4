//! Whole-build weaving: source sets, the dispatch coordinator and run reports.
//!
//! The weaver module operates on one unit at a time. This module scales that to a whole
//! compiler output: [`Weaver`] enumerates a [`SourceSet`], builds the [`crate::weaver::TypeIndex`]
//! every pipeline consults, and runs the pipelines concurrently. The outcome of every unit
//! is collected into a [`WeaveReport`].
//!
//! # Key Components
//!
//! - [`SourceSet`] - Unit enumeration and all-or-nothing writes
//! - [`DirectorySource`] / [`MemorySource`] - On-disk and in-memory source sets
//! - [`Weaver`] - The dispatch coordinator
//! - [`WeaveReport`] / [`UnitFailure`] - Per-unit outcomes
//!
//! # Thread Safety
//!
//! [`Weaver::run`] blocks the caller until every pipeline has finished. Cancellation is
//! cooperative through a [`CancellationFlag`] that may be raised from any thread, for
//! example a signal handler.

mod loader;
mod result;
mod source;

pub use loader::{CancellationFlag, Weaver};
pub use result::{UnitFailure, WeaveReport};
pub use source::{DirectorySource, MemorySource, SourceSet, UNIT_EXTENSION};
