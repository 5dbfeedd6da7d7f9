//! Error types for the [`stage`](super) module.

use crate::error::ErrorKind as LibraryErrorKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A staging error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for staging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// What failed while staging, and how far the failure reaches.
///
/// - [`Source`](Self::Source) ends the job for that source.
/// - [`Descriptor`](Self::Descriptor) and [`Entry`](Self::Entry) only affect
///   one item; its siblings are still processed.
/// - [`Cancelled`](Self::Cancelled) ends the job and the run.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("unable to read source {}", _0.display())]
    Source(#[error(not(source))] PathBuf),
    #[display("unable to read descriptor {_0}")]
    Descriptor(#[error(not(source))] String),
    #[display("unable to stage {_0}")]
    Entry(#[error(not(source))] String),
    #[display("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<&ErrorKind> for LibraryErrorKind {
    fn from(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::Source(path) => LibraryErrorKind::Source(path.clone()),
            ErrorKind::Descriptor(name) => LibraryErrorKind::Descriptor(name.clone()),
            ErrorKind::Entry(name) => LibraryErrorKind::Entry(name.clone()),
            ErrorKind::Cancelled => LibraryErrorKind::Cancelled,
        }
    }
}
