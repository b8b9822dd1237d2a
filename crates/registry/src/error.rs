//! Registry Error Types
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.
//! Failures from the content and metadata stores are classified into the
//! kinds below and kept as children in the error tree.

use derive_more::{Display, Error};
use fetchbox_metadata::error::{Error as MetadataError, ErrorKind as MetadataErrorKind};
use fetchbox_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// A registry error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the outcome of a failed registry operation.
///
/// ### State unchanged
/// - [`ErrorKind::InvalidInput`]
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::Conflict`]
/// - [`ErrorKind::Fetch`]
/// - [`ErrorKind::Write`]
/// - [`ErrorKind::Store`]
///
/// ### State requires repair
/// - [`ErrorKind::InconsistentState`]: a step failed after an earlier one had
///   already committed and couldn't be undone. Content and metadata have
///   diverged; retrying the delete of the affected record reconciles it.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed source URL or content name.
    #[display("invalid input: {_0}")]
    InvalidInput(#[error(not(source))] String),
    #[display("{_0} not found")]
    NotFound(#[error(not(source))] String),
    /// The target already exists, or no free content name could be found.
    #[display("conflict: {_0}")]
    Conflict(#[error(not(source))] String),
    /// Remote content unreachable or answered with a bad status.
    #[display("failed to fetch remote content")]
    Fetch,
    /// Content store I/O failed.
    #[display("content store operation failed")]
    Write,
    /// Metadata store I/O or validation failed.
    #[display("metadata store operation failed")]
    Store,
    #[display("content and metadata have diverged: {_0}")]
    InconsistentState(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch | Self::Write | Self::Store)
    }

    /// Returns `true` if the stores were left disagreeing with each other.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, Self::InconsistentState(_))
    }

    /// Classify a content store failure, keeping it as a child.
    #[track_caller]
    pub(crate) fn content(err: StorageError) -> Error {
        let kind = match &*err {
            StorageErrorKind::NotFound(name) => Self::NotFound(format!("content {name}")),
            StorageErrorKind::AlreadyExists(name) => Self::Conflict(format!("content {name} already exists")),
            StorageErrorKind::InvalidName(name) => Self::InvalidInput(format!("content name {name:?}")),
            StorageErrorKind::InvalidSource(source) => Self::InvalidInput(format!("source {source}")),
            StorageErrorKind::Fetch(_) | StorageErrorKind::Status(..) => Self::Fetch,
            _ => Self::Write,
        };
        err.raise(kind)
    }

    /// Classify a metadata store failure, keeping it as a child.
    #[track_caller]
    pub(crate) fn metadata(err: MetadataError) -> Error {
        let kind = match &*err {
            MetadataErrorKind::NotFound(id) => Self::NotFound(format!("file {id}")),
            MetadataErrorKind::Conflict(name) => Self::Conflict(format!("content name {name} already in use")),
            _ => Self::Store,
        };
        err.raise(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchbox_metadata::RecordId;
    use rstest::rstest;

    #[rstest]
    #[case(StorageErrorKind::NotFound("a".into()), "a not found")]
    #[case(StorageErrorKind::AlreadyExists("a".into()), "conflict")]
    #[case(StorageErrorKind::InvalidName("..".into()), "invalid input")]
    #[case(StorageErrorKind::InvalidSource("ftp://x".into()), "invalid input")]
    #[case(StorageErrorKind::Fetch("http://x".into()), "fetch")]
    #[case(StorageErrorKind::Status(404, "http://x".into()), "fetch")]
    #[case(StorageErrorKind::Io(std::io::Error::other("disk full")), "content store")]
    #[case(StorageErrorKind::BackendError("boom".into()), "content store")]
    fn test_content_classification(#[case] kind: StorageErrorKind, #[case] expected: &str) {
        let err = ErrorKind::content(StorageError::from(kind));
        let message = (*err).to_string();
        assert!(message.contains(expected), "{message} should mention {expected}");
    }

    #[test]
    fn test_metadata_classification() {
        let err = ErrorKind::metadata(MetadataError::from(MetadataErrorKind::NotFound(RecordId::from("42"))));
        assert!(matches!(&*err, ErrorKind::NotFound(what) if what == "file 42"));
        let err = ErrorKind::metadata(MetadataError::from(MetadataErrorKind::Conflict("b".into())));
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        let err = ErrorKind::metadata(MetadataError::from(MetadataErrorKind::Database));
        assert!(matches!(&*err, ErrorKind::Store));
    }

    #[test]
    fn test_only_inconsistent_state_needs_reconciliation() {
        assert!(ErrorKind::InconsistentState("x".into()).needs_reconciliation());
        assert!(!ErrorKind::InconsistentState("x".into()).is_retryable());
        assert!(!ErrorKind::Store.needs_reconciliation());
        assert!(ErrorKind::Store.is_retryable());
        assert!(!ErrorKind::NotFound("x".into()).is_retryable());
    }
}
