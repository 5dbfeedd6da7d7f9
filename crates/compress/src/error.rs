//! Compression Error Types

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The decoder or encoder could not be set up.
    #[display("unable to initialise {_0} codec")]
    Codec(#[error(not(source))] &'static str),
    /// The stream does not decode. Retrying with the same input is pointless.
    #[display("corrupt {_0} stream")]
    Corrupt(#[error(not(source))] &'static str),
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
