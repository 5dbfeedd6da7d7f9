//! Save title bindings.
//!
//! The console stores each world as an opaque `Save<something>.bin` file and
//! keeps the human-readable world title in a separate metadata descriptor.
//! A descriptor yields zero or more [`SaveBin`] bindings; how they are read is
//! abstracted behind [`SaveInfoParser`] so that other descriptor layouts can
//! be plugged in. [`BinarySaveInfoParser`] reads the layout written by the
//! console itself.

mod binary;
pub mod error;

pub use crate::binary::{BinarySaveInfoParser, DESCRIPTOR_MAGIC, DESCRIPTOR_VERSION};
use crate::error::Result;
use std::path::Path;

/// Binds a save file's internal name to the title shown on the console.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SaveBin {
    /// Name of the save file as stored on the console, e.g. `SaveProfile.bin`.
    pub internal_file_name: String,
    pub display_title: String,
}
impl SaveBin {
    pub fn new(internal_file_name: impl Into<String>, display_title: impl Into<String>) -> Self {
        Self {
            internal_file_name: internal_file_name.into(),
            display_title: display_title.into(),
        }
    }
}

/// Something that can turn a descriptor file into title bindings.
pub trait SaveInfoParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Vec<SaveBin>>;
}
