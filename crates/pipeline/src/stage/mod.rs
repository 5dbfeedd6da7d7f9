//! Extraction of saves from sources into the output directory.
//!
//! A source is processed in two passes. The first routes every metadata
//! descriptor into the [`SaveBinRegistry`](crate::SaveBinRegistry) and
//! collects the save files; the second stages each save, so a descriptor
//! listed after the save it describes still names it.
//!
//! Saves are written to a temporary file in the output directory, then
//! renamed to a free name. A partially written save never appears under a
//! staged name.

mod archive;
mod directory;
pub mod error;
mod stream;

pub use self::stream::{StageEvent, stage};
use crate::Context;
use crate::stage::error::{ErrorKind, Result};
use crate::unique::persist_unique;
use exn::ResultExt;
use std::fs::{File, FileTimes, Metadata, Permissions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc::UnboundedSender;
use x360mse_archive::error::{ErrorKind as ArchiveErrorKind, Result as ArchiveResult};

pub(crate) type Events = UnboundedSender<Result<StageEvent>>;

/// A save file written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSave {
    /// The directory, archive or file it came from.
    pub source: PathBuf,
    /// Its name inside the source.
    pub original_name: String,
    /// Where it was written.
    pub path: PathBuf,
    pub title: Option<String>,
    pub size: u64,
    pub duration: Duration,
}
impl StagedSave {
    pub fn file_name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

/// The name a save is staged under: `"<title> (<stem>).bin"` when it has a
/// usable title, otherwise its original name.
///
/// ```
/// use x360mse_pipeline::decorated_name;
///
/// assert_eq!(decorated_name("SaveProfile.bin", Some("Steve's World")), "Steve's World (SaveProfile).bin");
/// assert_eq!(decorated_name("SaveA.bin", Some("Home/Away: Part 2?")), "Home_Away_ Part 2_ (SaveA).bin");
/// assert_eq!(decorated_name("SaveA.bin", Some(" ... ")), "SaveA.bin");
/// assert_eq!(decorated_name("SaveA.bin", None), "SaveA.bin");
/// ```
pub fn decorated_name(original_name: &str, title: Option<&str>) -> String {
    let Some(title) = title.map(sanitize_title).filter(|t| !t.is_empty()) else {
        return original_name.to_string();
    };
    let stem = Path::new(original_name).file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    format!("{title} ({stem}).bin")
}

/// Make a console title safe to use in a file name on any platform.
fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced.trim().trim_end_matches('.').trim_end().to_string()
}

/// Timestamps to carry over onto a staged file.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Timestamps {
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub modified: Option<SystemTime>,
}
impl From<&Metadata> for Timestamps {
    fn from(metadata: &Metadata) -> Self {
        Self {
            created: metadata.created().ok(),
            accessed: metadata.accessed().ok(),
            modified: metadata.modified().ok(),
        }
    }
}

/// Write one save into the output directory.
///
/// `fill` receives the temporary file and returns the number of bytes it
/// wrote; nothing is renamed into place unless it succeeds.
///
/// The save keeps `permissions` when given (a copy of a file on disk).
/// Otherwise it gets the usual mode for a new file, `0o644` less the umask.
pub(crate) fn write_staged(
    ctx: &Context,
    source: &Path,
    original_name: &str,
    title: Option<String>,
    times: Timestamps,
    permissions: Option<Permissions>,
    fill: impl FnOnce(&mut File) -> Result<u64>,
) -> Result<StagedSave> {
    let start = Instant::now();
    let desired = decorated_name(original_name, title.as_deref());
    let mut builder = tempfile::Builder::new();
    builder.prefix(".x360mse-").suffix(".part");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o644));
    }
    let mut temp = builder.tempfile_in(&ctx.output).or_raise(|| ErrorKind::Entry(original_name.to_string()))?;
    let size = fill(temp.as_file_mut())?;
    if ctx.staging.preserve_timestamps {
        apply_timestamps(temp.as_file(), &times, original_name);
    }
    // After the timestamps: a read-only file cannot have them set everywhere.
    if let Some(permissions) = permissions
        && let Err(error) = temp.as_file().set_permissions(permissions)
    {
        tracing::warn!(entry = original_name, %error, "Unable to preserve permissions");
    }
    let path =
        persist_unique(temp, &ctx.output, &desired).or_raise(|| ErrorKind::Entry(original_name.to_string()))?;
    tracing::debug!(from = original_name, to = %path.display(), size, "Save staged");
    Ok(StagedSave {
        source: source.to_path_buf(),
        original_name: original_name.to_string(),
        path,
        title,
        size,
        duration: start.elapsed(),
    })
}

/// Best effort: a failure is only logged.
fn apply_timestamps(file: &File, times: &Timestamps, name: &str) {
    if times.created.is_none() && times.accessed.is_none() && times.modified.is_none() {
        return;
    }
    let mut file_times = FileTimes::new();
    if let Some(accessed) = times.accessed {
        file_times = file_times.set_accessed(accessed);
    }
    if let Some(modified) = times.modified {
        file_times = file_times.set_modified(modified);
    }
    #[cfg(windows)]
    if let Some(created) = times.created {
        use std::os::windows::fs::FileTimesExt;
        file_times = file_times.set_created(created);
    }
    if let Err(error) = file.set_times(file_times) {
        tracing::warn!(entry = name, %error, "Unable to preserve timestamps");
    }
}

/// Raise an archive failure into `otherwise`, keeping cancellation distinct.
pub(crate) fn raise_archive<T>(result: ArchiveResult<T>, otherwise: ErrorKind) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if matches!(*e, ArchiveErrorKind::Cancelled) => Err(e).or_raise(|| ErrorKind::Cancelled),
        Err(e) => Err(e).or_raise(|| otherwise.clone()),
    }
}

/// Whether a job should stop: the run was cancelled or nobody is listening.
pub(crate) fn stopped(ctx: &Context, events: &Events) -> bool {
    ctx.cancel.is_cancelled() || events.is_closed()
}

pub(crate) fn send(events: &Events, event: Result<StageEvent>) {
    // The receiver only goes away when the stream is dropped, and jobs check
    // for that between items.
    let _ = events.send(event);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;
    use x360mse_config::Config;
    use x360mse_saveinfo::error::Result as SaveInfoResult;
    use x360mse_saveinfo::{SaveBin, SaveInfoParser};

    /// Returns the same bindings for every descriptor.
    pub(crate) struct FixedParser(pub Vec<SaveBin>);
    impl SaveInfoParser for FixedParser {
        fn parse(&self, _path: &Path) -> SaveInfoResult<Vec<SaveBin>> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn context(output: &Path) -> Context {
        Context::new(&Config::default(), output).unwrap()
    }

    /// Run a job against a fresh channel and collect everything it sent.
    pub(crate) fn collect<T>(job: impl FnOnce(&Events) -> Result<T>) -> (Result<T>, Vec<Result<StageEvent>>) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let result = job(&tx);
        drop(tx);
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    #[rstest]
    #[case("Steve's World", "Steve's World")]
    #[case("  padded  ", "padded")]
    #[case("Ends with dots...", "Ends with dots")]
    #[case("a/b\\c", "a_b_c")]
    #[case("<>:\"|?*", "_______")]
    #[case("tab\there", "tab_here")]
    #[case("   ", "")]
    #[case("Ünïcødé ⛏", "Ünïcødé ⛏")]
    fn test_sanitize_title(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(sanitize_title(title), expected);
    }

    #[test]
    fn test_decorated_name_without_extension() {
        assert_eq!(decorated_name("SaveWorld", Some("World")), "World (SaveWorld).bin");
    }
}
