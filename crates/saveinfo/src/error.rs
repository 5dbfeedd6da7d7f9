//! Descriptor Error Types

use derive_more::{Display, Error};

/// A descriptor parsing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for descriptor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The descriptor could not be read from disk.
    #[display("unable to read descriptor")]
    Io,
    /// The file does not start with the descriptor magic number.
    #[display("not a save descriptor (magic {_0:#010x})")]
    BadMagic(#[error(not(source))] u32),
    /// The descriptor layout version is not understood.
    #[display("unsupported descriptor version {_0}")]
    UnsupportedVersion(#[error(not(source))] u32),
    /// The descriptor ended before the declared content.
    #[display("descriptor truncated while reading {_0}")]
    Truncated(#[error(not(source))] &'static str),
    /// A name or title is not valid UTF-16.
    #[display("invalid UTF-16 in {_0}")]
    InvalidText(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The bytes on disk will not change between attempts.
        matches!(self, ErrorKind::Io)
    }
}
