//! The concurrent dispatch coordinator.
//!
//! A run has two phases. The first is sequential: every unit is read and scanned once to
//! build the whole-set [`TypeIndex`]. The second runs one pipeline per unit on a bounded
//! rayon pool. Pipelines share nothing but the read-only index and configuration, and each
//! one owns its unit exclusively, so no locking happens during the rewrite itself.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use rayon::{prelude::*, ThreadPoolBuilder};

use crate::{
    classfile::ClassFile,
    project::{source::SourceSet, WeaveReport},
    weaver::{self, meta, TransformResult, TypeIndex, WeaverConfig, WeaverType},
    Error, Result,
};

/// Shared flag used to stop a run early.
pub type CancellationFlag = Arc<AtomicBool>;

enum Outcome {
    Woven(TransformResult),
    Untouched,
    Failed(Error),
    Cancelled,
}

/// Weaves every unit of a [`SourceSet`].
///
/// # Examples
///
/// ```rust
/// use weavescope::classfile::builder::ClassBuilder;
/// use weavescope::project::{MemorySource, Weaver};
/// use weavescope::weaver::{WeaverConfig, POOLED_MARKER};
///
/// let unit = ClassBuilder::new("com/example/Health")
///     .super_class("com/artemis/Component")
///     .annotation(POOLED_MARKER, false)
///     .field("hp", "I")
///     .default_constructor()
///     .to_bytes()?;
///
/// let source = MemorySource::new().with_unit("com/example/Health", unit);
/// let report = Weaver::new(WeaverConfig::default().with_threads(2)).run(&source)?;
///
/// assert_eq!(report.woven.len(), 1);
/// assert!(source.was_written("com/example/Health"));
/// # Ok::<(), weavescope::Error>(())
/// ```
pub struct Weaver {
    config: WeaverConfig,
    cancel: CancellationFlag,
}

impl Weaver {
    /// Create a weaver with its own cancellation flag.
    #[must_use]
    pub fn new(config: WeaverConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Use an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The flag that cancels this weaver's runs when raised.
    #[must_use]
    pub fn cancellation_flag(&self) -> CancellationFlag {
        Arc::clone(&self.cancel)
    }

    /// The configuration of this weaver.
    #[must_use]
    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    /// Weave every unit of `source`.
    ///
    /// Per-unit failures, including panics inside a pipeline, end up in
    /// [`WeaveReport::failed`] and never abort the run. Once the cancellation flag is
    /// raised, pipelines that have not started are reported as cancelled; pipelines already
    /// running finish normally.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the source set cannot be enumerated, or
    /// [`crate::Error::Error`] if the worker pool cannot be created.
    pub fn run(&self, source: &dyn SourceSet) -> Result<WeaveReport> {
        let mut report = WeaveReport::new();
        let names = source.names()?;

        let mut index = TypeIndex::new();
        let mut units = Vec::with_capacity(names.len());
        for name in names {
            let loaded = self.load(source, &name).map(|unit| {
                let scanned = Self::scan(&unit, &name);
                (unit, scanned)
            });
            match loaded {
                Ok((unit, Ok(metadata))) => {
                    index.insert(metadata.name, metadata.declared);
                    units.push((name, unit));
                }
                Ok((unit, Err(error))) => {
                    // Subtypes still resolve it as a member of the set.
                    if unit.name().is_ok_and(|declared| declared == name) {
                        index.insert(name.clone(), WeaverType::None);
                    }
                    log::warn!("{name}: {error}");
                    report.record_failure(&name, &error);
                }
                Err(error) => {
                    log::warn!("{name}: {error}");
                    report.record_failure(&name, &error);
                }
            }
        }
        log::debug!("indexed {} unit(s)", index.len());

        let index = Arc::new(index);
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("weaver-{i}"))
            .build()
            .map_err(|e| Error::Error(format!("failed to start worker pool: {e}")))?;

        let outcomes: Vec<(String, Outcome)> = pool.install(|| {
            units
                .into_par_iter()
                .map(|(name, unit)| {
                    let outcome = self.dispatch(source, &name, unit, &index);
                    (name, outcome)
                })
                .collect()
        });

        for (name, outcome) in outcomes {
            match outcome {
                Outcome::Woven(result) => report.record_woven(result),
                Outcome::Untouched => report.record_untouched(name),
                Outcome::Failed(error) => {
                    log::warn!("{name}: {error}");
                    report.record_failure(&name, &error);
                }
                Outcome::Cancelled => report.record_cancelled(name),
            }
        }
        report.sort();

        log::info!(
            "weaving finished: {} woven, {} untouched, {} failed, {} cancelled",
            report.woven.len(),
            report.untouched.len(),
            report.failed.len(),
            report.cancelled.len()
        );
        Ok(report)
    }

    /// Apply the configured failure policy to a report of [`Weaver::run`].
    ///
    /// # Errors
    /// See [`WeaveReport::check`], called with [`WeaverConfig::tolerate_partial`].
    pub fn check(&self, report: &WeaveReport) -> Result<()> {
        report.check(self.config.tolerate_partial)
    }

    fn load(&self, source: &dyn SourceSet, name: &str) -> Result<ClassFile> {
        let data = source.read(name)?;
        ClassFile::read_versioned(
            &data,
            self.config.min_major_version,
            self.config.max_major_version,
        )
    }

    fn scan(unit: &ClassFile, name: &str) -> Result<meta::ClassMetadata> {
        let metadata = meta::scan(unit)?;
        if metadata.name != name {
            return Err(malformed_error!(
                "unit {} is stored under {}",
                metadata.name,
                name
            ));
        }
        Ok(metadata)
    }

    fn dispatch(
        &self,
        source: &dyn SourceSet,
        name: &str,
        unit: ClassFile,
        index: &TypeIndex,
    ) -> Outcome {
        if self.cancel.load(Ordering::Relaxed) {
            return Outcome::Cancelled;
        }

        let weave = || -> Result<Option<TransformResult>> {
            match weaver::weave(unit, index, &self.config)? {
                Some(result) => {
                    if self.config.write_output {
                        source.write(name, &result.bytes)?;
                    }
                    Ok(Some(result))
                }
                None => Ok(None),
            }
        };
        let pipeline = panic::catch_unwind(AssertUnwindSafe(weave));

        match pipeline {
            Ok(Ok(Some(result))) => Outcome::Woven(result),
            Ok(Ok(None)) => Outcome::Untouched,
            Ok(Err(error)) => Outcome::Failed(error),
            Err(payload) => {
                Outcome::Failed(Error::PipelinePanic(panic_message(payload.as_ref())))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
