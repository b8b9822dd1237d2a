//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Content object does not exist
    #[display("content not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Content object already exists (for operations that refuse to overwrite)
    #[display("content already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Name contains separators, traversal components or invalid characters
    #[display("invalid content name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// Source location cannot be fetched by this backend (unsupported scheme)
    #[display("unsupported source: {_0}")]
    InvalidSource(#[error(not(source))] String),
    /// Remote content could not be reached
    #[display("failed to fetch {_0}")]
    Fetch(#[error(not(source))] String),
    /// Remote content answered with a non-success status
    #[display("fetching {_1} returned status {_0}")]
    Status(#[error(not(source))] u16, #[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Fetch(_) | Self::BackendError(_) => true,
            // Server-side failures and rate limiting may clear up; client errors won't.
            Self::Status(code, _) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}
