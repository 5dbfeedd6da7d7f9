//! Error types for the [`convert`](super) module.

use crate::error::ErrorKind as LibraryErrorKind;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// A conversion driver error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion driver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a staged save was not converted.
///
/// A converter that runs and reports a failure is not an error; see
/// [`ConversionStatus::Failed`](super::ConversionStatus::Failed).
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("no title binding for {}", _0.display())]
    BindingNotFound(#[error(not(source))] PathBuf),
    /// The converter could not be run at all.
    #[display("unable to convert {}", _0.display())]
    Conversion(#[error(not(source))] PathBuf),
    #[display("unable to write to {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
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
            ErrorKind::BindingNotFound(path) => LibraryErrorKind::BindingNotFound(path.clone()),
            ErrorKind::Conversion(path) => LibraryErrorKind::Conversion(path.clone()),
            ErrorKind::Output(path) => LibraryErrorKind::Output(path.clone()),
            ErrorKind::Cancelled => LibraryErrorKind::Cancelled,
        }
    }
}
