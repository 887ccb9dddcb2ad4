use strum::{Display, EnumString};
use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::MalformedUnit {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::MalformedUnit {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::MalformedUnit {
            message: "truncated section, read past the end of the unit".to_string(),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two groups. The per-unit errors ([`Error::MalformedUnit`] through
/// [`Error::StaleTransform`]) are scoped to the pipeline of a single compiled unit: the
/// dispatch coordinator catches them at the pipeline boundary and records them in the
/// [`crate::project::WeaveReport`] without affecting sibling units. The remaining variants
/// describe failures of the run itself (I/O on the source set, a panicking worker).
///
/// # Error Categories
///
/// ## Reading
/// - [`Error::MalformedUnit`] - Wrong magic, truncated section, unsupported version, bad constant
///
/// ## Scanning and validation
/// - [`Error::AmbiguousClassification`] - More than one classification marker declared
/// - [`Error::UnpackableField`] - A packed unit holds a heap-typed field
/// - [`Error::MissingDefaultConstructor`] - A pooled unit lacks `<init>()V`
/// - [`Error::AlreadyPacked`] - A packed unit already extends the packed base
/// - [`Error::StaleTransform`] - Woven output no longer matches its declaration
///
/// ## Transformation
/// - [`Error::UnresolvedReference`] - A referenced type is missing from the whole-set index
///
/// # Examples
///
/// ```rust
/// use weavescope::{ClassFile, Error};
///
/// match ClassFile::read(&[0xCA, 0xFE]) {
///     Err(Error::MalformedUnit { message, .. }) => println!("unreadable: {message}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The binary does not match the compiled-unit format.
    ///
    /// Raised for a wrong magic header, a truncated section, a version outside the
    /// supported range, or an inconsistent constant pool. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    MalformedUnit {
        /// The message to be printed for the MalformedUnit error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// More than one classification marker is declared on the same unit.
    #[error("Conflicting classification markers - {first} and {second}")]
    AmbiguousClassification {
        /// The marker checked first
        first: String,
        /// The conflicting marker
        second: String,
    },

    /// A packed unit declares a field whose value kind cannot live in a packed buffer.
    #[error("Field can not be packed - {0}")]
    UnpackableField(String),

    /// A pooled unit does not declare a no-argument constructor.
    #[error("Pooled type has no default constructor - {0}")]
    MissingDefaultConstructor(String),

    /// A unit marked for packing already extends the packed base type.
    #[error("Type is already packed - {0}")]
    AlreadyPacked(String),

    /// A type referenced by the unit is neither an external root nor part of the source set.
    #[error("Unresolved type reference - {0}")]
    UnresolvedReference(String),

    /// The unit carries the woven marker, but its declaration drifted since weaving.
    ///
    /// The declared classification differs from the recorded strategy, or the field table
    /// changed without the marker being cleared.
    #[error("Stale transform on {name}: {reason}")]
    StaleTransform {
        /// The unit carrying the stale marker
        name: String,
        /// What changed since weaving
        reason: String,
    },

    /// A pipeline worker panicked while processing a unit.
    #[error("Pipeline panicked - {0}")]
    PipelinePanic(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while enumerating, reading or writing
    /// the source set.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

/// Closed classification of [`Error`] variants, used in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum ErrorKind {
    /// See [`Error::MalformedUnit`]
    MalformedUnit,
    /// See [`Error::AmbiguousClassification`]
    AmbiguousClassification,
    /// See [`Error::UnpackableField`]
    UnpackableField,
    /// See [`Error::MissingDefaultConstructor`]
    MissingDefaultConstructor,
    /// See [`Error::AlreadyPacked`]
    AlreadyPacked,
    /// See [`Error::UnresolvedReference`]
    UnresolvedReference,
    /// See [`Error::StaleTransform`]
    StaleTransform,
    /// See [`Error::PipelinePanic`]
    PipelinePanic,
    /// See [`Error::FileError`]
    Io,
    /// See [`Error::Error`]
    Other,
}

impl Error {
    /// Returns the [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedUnit { .. } => ErrorKind::MalformedUnit,
            Error::AmbiguousClassification { .. } => ErrorKind::AmbiguousClassification,
            Error::UnpackableField(_) => ErrorKind::UnpackableField,
            Error::MissingDefaultConstructor(_) => ErrorKind::MissingDefaultConstructor,
            Error::AlreadyPacked(_) => ErrorKind::AlreadyPacked,
            Error::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            Error::StaleTransform { .. } => ErrorKind::StaleTransform,
            Error::PipelinePanic(_) => ErrorKind::PipelinePanic,
            Error::FileError(_) => ErrorKind::Io,
            Error::Error(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            Error::UnpackableField("tag".into()).kind(),
            ErrorKind::UnpackableField
        );
        assert_eq!(malformed_error!("bad").kind(), ErrorKind::MalformedUnit);
        assert_eq!(out_of_bounds_error!().kind(), ErrorKind::MalformedUnit);
    }

    #[test]
    fn test_ambiguous_message_names_both_markers() {
        let err = Error::AmbiguousClassification {
            first: "pooled".into(),
            second: "packed".into(),
        };
        let text = err.to_string();
        assert!(text.contains("pooled"));
        assert!(text.contains("packed"));
    }

    #[test]
    fn test_kind_renders_pascal_case() {
        assert_eq!(ErrorKind::StaleTransform.to_string(), "StaleTransform");
        assert_eq!(
            "UnresolvedReference".parse::<ErrorKind>().unwrap(),
            ErrorKind::UnresolvedReference
        );
    }
}
