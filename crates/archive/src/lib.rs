//! Archive listing and per-entry extraction.
//!
//! Every supported container is exposed through the [`Archive`] trait, which
//! offers exactly what the save extractor needs from a container and nothing
//! more: list the entries, then stream one entry (by index) into a sink while
//! reporting [`Progress`].
//!
//! | Format                 | Extensions                              |
//! |------------------------|-----------------------------------------|
//! | Zip                    | `.zip`                                  |
//! | 7-Zip                  | `.7z`                                   |
//! | Tar (optionally compressed) | `.tar`, `.tar.gz`/`.tgz`, `.tar.bz2`/`.tbz2`, `.tar.xz`/`.txz`, `.tar.zst`/`.tzst` |
//! | Compressed stream      | `.gz`, `.bz2`, `.xz`, `.zst` (a single entry named after the stem) |
//!
//! Other names in [`KNOWN_EXTENSIONS`] (disk images, rar, cab, ...) are
//! recognised as containers, but [`open`] rejects them with
//! [`ErrorKind::UnsupportedFormat`](crate::error::ErrorKind::UnsupportedFormat).

pub mod error;
mod format;
mod progress;
mod sevenz;
mod stream;
mod tarball;
mod zipfile;

pub use crate::format::{ArchiveFormat, KNOWN_EXTENSIONS};
pub use crate::progress::copy_with_progress;
use crate::error::Result;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::SystemTime;
use tracing::instrument;

/// Progress of a single entry extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes written to the sink so far.
    pub processed: u64,
    /// Uncompressed size of the entry, or zero when the container does not
    /// record it (compressed streams).
    pub total: u64,
}

/// Callback invoked as entry data is written. Returning
/// [`ControlFlow::Break`] aborts the extraction with
/// [`ErrorKind::Cancelled`](crate::error::ErrorKind::Cancelled).
pub type ProgressFn<'a> = dyn FnMut(Progress) -> ControlFlow<()> + 'a;

/// A named item inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position of the entry in the archive listing; pass this back to
    /// [`Archive::extract`].
    pub index: usize,
    /// Full name inside the archive, using `/` separators.
    pub name: String,
    /// Uncompressed size in bytes (zero if unknown).
    pub size: u64,
    pub is_dir: bool,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}
impl ArchiveEntry {
    pub(crate) fn new(index: usize, name: impl Into<String>, size: u64, is_dir: bool) -> Self {
        Self {
            index,
            name: name.into(),
            size,
            is_dir,
            created: None,
            accessed: None,
            modified: None,
        }
    }

    /// The final component of [`name`](Self::name).
    ///
    /// Archives built on Windows occasionally use backslashes, so both
    /// separators are honoured.
    ///
    /// ```
    /// # let mut entry = x360mse_archive::ArchiveEntry::default();
    /// entry.name = "Content/0000000000000000/SaveWorld.bin".to_string();
    /// assert_eq!(entry.file_name(), "SaveWorld.bin");
    /// entry.name = r"Backup\SaveWorld.bin".to_string();
    /// assert_eq!(entry.file_name(), "SaveWorld.bin");
    /// ```
    pub fn file_name(&self) -> &str {
        self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name)
    }
}
impl Default for ArchiveEntry {
    fn default() -> Self {
        Self::new(0, String::new(), 0, false)
    }
}

/// An opened archive.
///
/// Implementations keep whatever handle they need between calls; callers
/// should list first, then extract any number of entries by index.
pub trait Archive: Send {
    /// The detected container format.
    fn format(&self) -> ArchiveFormat;

    /// List every entry in the archive, directories included.
    fn entries(&mut self) -> Result<Vec<ArchiveEntry>>;

    /// Stream the entry at `index` into `sink`, returning the number of bytes
    /// written.
    fn extract(&mut self, index: usize, sink: &mut dyn Write, on_progress: &mut ProgressFn<'_>) -> Result<u64>;
}

/// Open the archive at `path`, detecting its format from the file name.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn Archive>> {
    let path = path.as_ref();
    let format = ArchiveFormat::detect(path)?;
    tracing::debug!(%format, "Opening archive");
    let archive: Box<dyn Archive> = match format {
        ArchiveFormat::Zip => Box::new(zipfile::ZipFile::open(path)?),
        ArchiveFormat::SevenZip => Box::new(sevenz::SevenZipFile::open(path)?),
        ArchiveFormat::Tar(compression) => Box::new(tarball::Tarball::new(path, compression)),
        ArchiveFormat::Stream(compression) => Box::new(stream::CompressedStream::open(path, compression)?),
    };
    Ok(archive)
}
