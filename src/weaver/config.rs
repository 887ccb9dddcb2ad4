//! Configuration for a weaving run.
//!
//! This module provides [`WeaverConfig`], which controls the worker pool size, the accepted
//! class-file versions, the supertypes accepted without an index lookup and whether woven
//! output is written back to the source set.

use crate::classfile::{MAX_MAJOR_VERSION, MIN_MAJOR_VERSION};

/// Supertypes every unit may extend without the type being part of the source set.
pub const DEFAULT_EXTERNAL_TYPES: &[&str] = &[
    "java/lang/Object",
    "com/artemis/Component",
    "com/artemis/PooledComponent",
    "com/artemis/PackedComponent",
];

/// Configuration for the weaver.
///
/// Controls the concurrency of the dispatch coordinator, the validation of supertypes and the
/// class-file versions accepted by the reader.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// Worker threads for the pipeline pool (0 = one per logical CPU, default: 0).
    pub threads: usize,

    /// Internal names accepted as supertypes without an entry in the whole-set index.
    pub external_types: Vec<String>,

    /// Oldest accepted class-file major version (default: 45).
    pub min_major_version: u16,

    /// Newest accepted class-file major version (default: 69).
    pub max_major_version: u16,

    /// Write woven units back to the source set (default: true). When false the run is a
    /// dry run and only the report is produced.
    pub write_output: bool,

    /// Treat a run with failed units as successful (default: false).
    pub tolerate_partial: bool,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            external_types: DEFAULT_EXTERNAL_TYPES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            min_major_version: MIN_MAJOR_VERSION,
            max_major_version: MAX_MAJOR_VERSION,
            write_output: true,
            tolerate_partial: false,
        }
    }
}

impl WeaverConfig {
    /// Creates a new configuration with default settings.
    ///
    /// # Returns
    ///
    /// A new `WeaverConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// # Arguments
    ///
    /// * `threads` - Pool size, 0 for one thread per logical CPU.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Accepts an additional supertype that lives outside the source set.
    ///
    /// # Arguments
    ///
    /// * `name` - Internal name, e.g. `com/example/BaseComponent`.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_external_type(mut self, name: impl Into<String>) -> Self {
        self.external_types.push(name.into());
        self
    }

    /// Restricts the accepted class-file major versions.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_version_range(mut self, min: u16, max: u16) -> Self {
        self.min_major_version = min;
        self.max_major_version = max;
        self
    }

    /// Enables or disables writing woven units back.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_write_output(mut self, write: bool) -> Self {
        self.write_output = write;
        self
    }

    /// Tolerates failed units when checking the run report.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_tolerate_partial(mut self, tolerate: bool) -> Self {
        self.tolerate_partial = tolerate;
        self
    }

    /// Returns `true` if `name` is an accepted external supertype.
    #[must_use]
    pub fn is_external(&self, name: &str) -> bool {
        self.external_types.iter().any(|external| external == name)
    }
}
