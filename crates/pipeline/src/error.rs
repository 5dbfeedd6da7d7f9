//! Pipeline Error Types
//!
//! Each driver has its own error module ([`stage::error`](crate::stage::error),
//! [`convert::error`](crate::convert::error)); their errors are raised into
//! this taxonomy at the public boundary, so callers only ever match on one
//! [`ErrorKind`] while the full error tree stays available for reporting.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Only [`Classification`](Self::Classification) and
/// [`Pattern`](Self::Pattern) should abort a run; everything else is isolated
/// to the source, entry or save it names.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input is neither a directory, a save file nor a recognised archive.
    #[display("{} is not a directory, save file or recognised archive", _0.display())]
    Classification(#[error(not(source))] PathBuf),
    /// A configured pattern does not compile.
    #[display("invalid pattern: {_0}")]
    Pattern(#[error(not(source))] String),
    /// An archive could not be opened or listed, or a directory read.
    #[display("unable to read source {}", _0.display())]
    Source(#[error(not(source))] PathBuf),
    /// A metadata descriptor could not be extracted or parsed.
    #[display("unable to read descriptor {_0}")]
    Descriptor(#[error(not(source))] String),
    /// A single save could not be extracted or copied.
    #[display("unable to stage {_0}")]
    Entry(#[error(not(source))] String),
    /// A staged save has no title binding, so it was not converted.
    #[display("no title binding for {}", _0.display())]
    BindingNotFound(#[error(not(source))] PathBuf),
    /// The converter could not be run for a staged save.
    #[display("unable to convert {}", _0.display())]
    Conversion(#[error(not(source))] PathBuf),
    /// The output directory could not be created or listed.
    #[display("unable to use output directory {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    #[display("cancelled")]
    Cancelled,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Returns `true` if the run cannot meaningfully continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Classification(_) | ErrorKind::Pattern(_) | ErrorKind::Output(_))
    }
}
