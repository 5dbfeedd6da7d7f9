use crate::TempFile;
use crate::error::{ErrorKind, Result};
use crate::nbt::{Root, Tag, modified_utf8};
use exn::ResultExt;
use std::io::Write;
use std::path::Path;
use tracing::instrument;
use x360mse_compress::Compression;

/// Set `Data.LevelName` in a `level.dat` file to `name`.
///
/// The file is normally gzip-compressed but uncompressed files are accepted
/// too; either way it is written back in the compression it was read in. The
/// replacement is written to a temporary file next to the original and then
/// renamed over it.
///
/// Returns `Ok(false)` (and leaves the file untouched) if the root compound
/// has no `Data` compound.
#[instrument(skip_all, fields(path = %level_dat.display(), name = %name))]
pub fn set_display_name(level_dat: &Path, name: &str) -> Result<bool> {
    let raw = std::fs::read(level_dat).or_raise(|| ErrorKind::Io)?;
    let compression = Compression::from_magic_bytes(&raw);
    let bytes = compression
        .decompress(&raw)
        .or_raise(|| ErrorKind::MalformedNbt("level data does not decompress".to_string()))?;

    let mut root = Root::parse(&bytes)?;
    let Some(data) = root.tag.child_mut("Data").filter(|tag| matches!(tag, Tag::Compound(_))) else {
        tracing::warn!("level.dat has no Data compound; display name not set");
        return Ok(false);
    };
    data.set_child("LevelName", Tag::String(modified_utf8(name)));

    let encoded = compression.compress(&root.to_bytes()).or_raise(|| ErrorKind::Io)?;
    let directory = level_dat.parent().unwrap_or(Path::new("."));
    let mut temp = TempFile::new_in(directory).or_raise(|| ErrorKind::Io)?;
    temp.write_all(&encoded).or_raise(|| ErrorKind::Io)?;
    temp.as_file().sync_all().or_raise(|| ErrorKind::Io)?;
    temp.persist(level_dat).or_raise(|| ErrorKind::Io)?;
    tracing::debug!("Display name written");
    Ok(true)
}
