//! Weaving run results and statistics.
//!
//! This module provides [`WeaveReport`], which records the outcome of every unit in a run:
//! woven, left untouched, failed or cancelled. Failures are captured per unit so one broken
//! unit never hides the results of its siblings.

use crate::{weaver::TransformResult, Error, ErrorKind};

/// A unit whose pipeline ended in an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Internal name of the unit
    pub name: String,
    /// What went wrong
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl UnitFailure {
    /// Record `error` against the unit `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, error: &Error) -> Self {
        Self {
            name: name.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of a weaving run.
///
/// Contains one entry per unit of the source set. Every name lands in exactly one of the
/// four lists.
///
/// # Usage
///
/// ```rust,no_run
/// use weavescope::project::{DirectorySource, Weaver};
/// use weavescope::weaver::WeaverConfig;
///
/// # fn main() -> weavescope::Result<()> {
/// let source = DirectorySource::new("target/classes")?;
/// let report = Weaver::new(WeaverConfig::default()).run(&source)?;
///
/// if report.is_complete_success() {
///     println!("Wove {} units", report.woven.len());
/// } else {
///     for failure in &report.failed {
///         println!("{}: {} ({})", failure.name, failure.kind, failure.message);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct WeaveReport {
    /// Units that were rewritten
    pub woven: Vec<TransformResult>,
    /// Units classified as needing no weaving
    pub untouched: Vec<String>,
    /// Units whose pipeline failed
    pub failed: Vec<UnitFailure>,
    /// Units skipped because the run was cancelled before their pipeline started
    pub cancelled: Vec<String>,
}

impl WeaveReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no unit failed and none was cancelled.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Returns true if at least one unit failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Units that went through their pipeline without error.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.woven.len() + self.untouched.len()
    }

    /// Units whose pipeline failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Every unit the report accounts for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.success_count() + self.failed.len() + self.cancelled.len()
    }

    /// Look up the failure recorded for a unit.
    #[must_use]
    pub fn failure(&self, name: &str) -> Option<&UnitFailure> {
        self.failed.iter().find(|failure| failure.name == name)
    }

    /// Look up a woven unit.
    #[must_use]
    pub fn woven_unit(&self, name: &str) -> Option<&TransformResult> {
        self.woven.iter().find(|result| result.name == name)
    }

    /// Turn the report into an error for callers that treat failures as fatal.
    ///
    /// A cancelled run is always an error. Failed units are an error unless
    /// `tolerate_partial` is set.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] naming the failed or cancelled units.
    pub fn check(&self, tolerate_partial: bool) -> crate::Result<()> {
        if !self.cancelled.is_empty() {
            return Err(Error::Error(format!(
                "weaving cancelled, {} unit(s) not processed",
                self.cancelled.len()
            )));
        }
        if self.has_failures() && !tolerate_partial {
            let names: Vec<&str> = self.failed.iter().map(|f| f.name.as_str()).collect();
            return Err(Error::Error(format!(
                "{} unit(s) failed to weave: {}",
                self.failed.len(),
                names.join(", ")
            )));
        }
        Ok(())
    }

    pub(crate) fn record_woven(&mut self, result: TransformResult) {
        self.woven.push(result);
    }

    pub(crate) fn record_untouched(&mut self, name: String) {
        self.untouched.push(name);
    }

    pub(crate) fn record_failure(&mut self, name: &str, error: &Error) {
        self.failed.push(UnitFailure::new(name, error));
    }

    pub(crate) fn record_cancelled(&mut self, name: String) {
        self.cancelled.push(name);
    }

    /// Sort every list by unit name so reports of repeated runs compare equal.
    pub(crate) fn sort(&mut self) {
        self.woven.sort_by(|a, b| a.name.cmp(&b.name));
        self.untouched.sort();
        self.failed.sort_by(|a, b| a.name.cmp(&b.name));
        self.cancelled.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_failures() {
        let mut report = WeaveReport::new();
        report.record_untouched("a/A".into());
        assert!(report.is_complete_success());
        assert!(report.check(false).is_ok());

        report.record_failure("a/B", &Error::UnpackableField("a/B.tag".into()));
        assert!(report.has_failures());
        assert_eq!(report.failure("a/B").unwrap().kind, ErrorKind::UnpackableField);
        assert!(report.check(false).unwrap_err().to_string().contains("a/B"));
        assert!(report.check(true).is_ok());
        assert_eq!(report.total(), 2);
    }

    #[test]
    fn test_cancelled_is_never_tolerated() {
        let mut report = WeaveReport::new();
        report.record_cancelled("a/C".into());
        assert!(!report.is_complete_success());
        assert!(report.check(true).is_err());
    }
}
