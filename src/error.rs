//! Errors that end a run of the command-line tool.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("unable to load configuration")]
    Config,
    /// An input could not be classified, or a pattern is invalid.
    #[display("unable to use the given inputs")]
    Input,
    #[display("unable to prepare the output directory")]
    Output,
    #[display("cancelled")]
    Cancelled,
}
