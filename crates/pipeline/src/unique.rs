use std::io::{self, ErrorKind as IoErrorKind};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Attempts at claiming a name before giving up on a persist.
const MAX_PERSIST_ATTEMPTS: usize = 16;

/// Return `directory/desired_name`, or the first free `stem (N).ext` with
/// `N` counting up from 2. Nothing is created.
///
/// ```
/// # let dir = tempfile::tempdir().unwrap();
/// use x360mse_pipeline::unique_path;
///
/// assert_eq!(unique_path(dir.path(), "SaveWorld.bin"), dir.path().join("SaveWorld.bin"));
/// std::fs::write(dir.path().join("SaveWorld.bin"), b"").unwrap();
/// assert_eq!(unique_path(dir.path(), "SaveWorld.bin"), dir.path().join("SaveWorld (2).bin"));
/// ```
pub fn unique_path(directory: impl AsRef<Path>, desired_name: &str) -> PathBuf {
    let directory = directory.as_ref();
    let candidate = directory.join(desired_name);
    if !exists(&candidate) {
        return candidate;
    }
    let desired = Path::new(desired_name);
    let stem = desired.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let extension = desired.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
    (2u64..)
        .map(|n| directory.join(format!("{stem} ({n}){extension}")))
        .find(|candidate| !exists(candidate))
        .unwrap_or(candidate)
}

/// Dangling symlinks count as taken.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Move a fully written temporary file to a unique name derived from
/// `desired_name`, never replacing an existing file.
///
/// Another writer may claim the chosen name between choosing and renaming; in
/// that case a new name is chosen and the rename retried.
pub(crate) fn persist_unique(mut file: NamedTempFile, directory: &Path, desired_name: &str) -> io::Result<PathBuf> {
    for _ in 0..MAX_PERSIST_ATTEMPTS {
        let target = unique_path(directory, desired_name);
        match file.persist_noclobber(&target) {
            Ok(_) => return Ok(target),
            Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => {
                tracing::debug!(target = %target.display(), "Name claimed concurrently; retrying");
                file = e.file;
            },
            Err(e) => return Err(e.error),
        }
    }
    Err(io::Error::new(IoErrorKind::AlreadyExists, format!("no free name found for {desired_name}")))
}
