//! Archive Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The archive could not be opened or its directory could not be read.
    #[display("failed to open archive: {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    /// The container is recognised but there is no decoder for it.
    #[display("unsupported archive format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// Entry data is corrupt or uses an unsupported compression method.
    #[display("invalid or corrupted archive data")]
    Corrupt,
    /// No entry exists at the requested index.
    #[display("no entry at index {_0}")]
    EntryNotFound(#[error(not(source))] usize),
    /// Writing extracted data to the sink failed.
    #[display("I/O error")]
    Io,
    /// The progress callback asked for extraction to stop.
    #[display("extraction cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
