//! Conversion Error Types
//!
//! A converter that runs and reports failure is *not* an error here; that is
//! a [`ConversionStatus::Failed`](crate::ConversionStatus::Failed). These
//! errors cover everything around it: finding the program, spawning it, and
//! patching the converted world.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A conversion error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("no converter program found on PATH")]
    ConverterNotFound,
    /// The converter could not be started.
    #[display("failed to launch converter: {}", _0.display())]
    Spawn(#[error(not(source))] PathBuf),
    /// The converter was killed because the run was cancelled.
    #[display("conversion cancelled")]
    Cancelled,
    /// The level data is not valid NBT.
    #[display("malformed NBT: {_0}")]
    MalformedNbt(#[error(not(source))] String),
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
