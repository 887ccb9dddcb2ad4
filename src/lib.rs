// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # weavescope
//!
//! A build-time weaver for entity-component-system components compiled to JVM class files.
//!
//! Component types declare how they want to be stored with a marker annotation. After
//! compilation, `weavescope` rewrites every marked class file:
//!
//! - **Pooled** components (`@PooledWeaver`) get a `reset()` hook and move under the pooled
//!   component base, so the runtime recycles instances instead of allocating new ones.
//! - **Packed** components (`@PackedWeaver`) lose their instance fields. Every field is
//!   stored at a fixed offset of a slot in one shared byte buffer, and all field accesses
//!   inside the class are routed through generated offset accessors.
//!
//! Unmarked classes are left byte-for-byte untouched, and woven output carries a marker so
//! a second run never weaves a class twice.
//!
//! ## Features
//!
//! - **Class-file model** - Read, edit and write class files with a byte-exact round trip
//! - **Deterministic layouts** - Packed offsets depend on nothing but field declaration order
//! - **Concurrent weaving** - One pipeline per class on a bounded worker pool
//! - **Failure isolation** - A broken class is reported, its siblings are still woven
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use weavescope::prelude::*;
//!
//! let source = DirectorySource::new("target/classes")?;
//! let weaver = Weaver::new(WeaverConfig::default());
//! let report = weaver.run(&source)?;
//!
//! println!("{} woven, {} failed", report.woven.len(), report.failure_count());
//! weaver.check(&report)?;
//! # Ok::<(), weavescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - Big-endian readers and the bounded [`Parser`]
//! - [`classfile`] - The structural model of a compiled unit, plus [`classfile::builder`]
//! - [`weaver`] - Scanning, classification, validation and the two strategies
//! - [`project`] - Source sets, the concurrent coordinator and run reports
//! - [`ecs`] - Runtime collaborators of woven components
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Per-class errors are collected into the
//! [`project::WeaveReport`] instead of aborting a run; see [`Error`] for the categories.

#[macro_use]
pub(crate) mod error;

pub mod classfile;
pub mod ecs;
pub mod file;
pub mod prelude;
pub mod project;
pub mod weaver;

#[cfg(test)]
mod test;

/// `weavescope` Result type
pub type Result<T> = std::result::Result<T, Error>;

/// `weavescope` Error type
pub use error::{Error, ErrorKind};

/// The structural model of a compiled unit
pub use classfile::ClassFile;

/// Bounded cursor over raw bytes
pub use file::parser::Parser;
