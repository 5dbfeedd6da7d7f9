//! Conversion of staged console saves into editable worlds.
//!
//! The heavy lifting is done by an external program behind the [`Converter`]
//! trait; [`CommandConverter`] drives any program that follows the
//! `--input/--output/--threads` calling convention. Once a world has been
//! converted, [`set_display_name`] writes the console title into its
//! `level.dat` so that it shows up under the right name.

mod command;
pub mod error;
mod level;
mod nbt;

pub use crate::command::{CONVERTER_CANDIDATES, CommandConverter};
use crate::error::Result;
pub use crate::level::set_display_name;
use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub type TempFile = tempfile::NamedTempFile;

/// One frame of the stack trace reported by a failed converter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceFrame {
    pub file: String,
    pub line: u32,
}
impl Display for TraceFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Why the converter gave up on a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub message: String,
    /// Innermost frame first.
    pub trace: Vec<TraceFrame>,
}

/// What happened when the converter ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Success,
    Failed(ConversionFailure),
}

/// Converts a single staged save file into a world directory.
pub trait Converter: Send + Sync {
    /// Convert `input` into `output_dir`, using up to `parallelism` threads.
    ///
    /// Implementations must stop (and return
    /// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled)) once
    /// `cancel` fires.
    fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        parallelism: usize,
        cancel: &CancellationToken,
    ) -> Result<ConversionStatus>;

    /// Write `name` into the converted world's `level.dat`.
    fn set_display_name(&self, level_dat: &Path, name: &str) -> Result<bool> {
        set_display_name(level_dat, name)
    }
}
