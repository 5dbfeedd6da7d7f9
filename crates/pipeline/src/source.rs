use crate::classify::PatternClassifier;
use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};

/// The shape of one top-level input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    /// A directory, typically the content folder of a console drive.
    Directory(PathBuf),
    /// A single save file.
    LooseFile(PathBuf),
    /// A backup archive or disk image.
    Archive(PathBuf),
}

/// One unit of extraction work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Directory(PathBuf),
    LooseFile(PathBuf),
    Archive(PathBuf),
}

impl Job {
    pub fn path(&self) -> &Path {
        match self {
            Job::Directory(path) | Job::LooseFile(path) | Job::Archive(path) => path,
        }
    }
}
impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Job::Directory(path) => write!(f, "directory {}", path.display()),
            Job::LooseFile(path) => write!(f, "file {}", path.display()),
            Job::Archive(path) => write!(f, "archive {}", path.display()),
        }
    }
}

impl InputSpec {
    /// Decide what kind of input `path` is. Symlinks are followed.
    pub fn classify(path: impl AsRef<Path>, classifier: &PatternClassifier) -> Result<Self> {
        let path = path.as_ref();
        let Ok(metadata) = fs::metadata(path) else {
            exn::bail!(ErrorKind::Classification(path.to_path_buf()));
        };
        if metadata.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if metadata.is_file() {
            if classifier.is_save_file(&name) {
                return Ok(Self::LooseFile(path.to_path_buf()));
            }
            if classifier.is_archive(&name) {
                return Ok(Self::Archive(path.to_path_buf()));
            }
        }
        exn::bail!(ErrorKind::Classification(path.to_path_buf()));
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::LooseFile(path) | Self::Archive(path) => path,
        }
    }

    /// Expand into the jobs that process this input, in order.
    ///
    /// A directory is one job. With `nested_archives`, every archive directly
    /// inside it becomes an extra job too (sorted by name); nothing below the
    /// first level is looked at.
    pub fn jobs(&self, classifier: &PatternClassifier, nested_archives: bool) -> Vec<Job> {
        match self {
            Self::LooseFile(path) => vec![Job::LooseFile(path.clone())],
            Self::Archive(path) => vec![Job::Archive(path.clone())],
            Self::Directory(path) => {
                let mut jobs = vec![Job::Directory(path.clone())];
                if nested_archives {
                    // An unreadable directory is reported by its own job.
                    let children = regular_files(path).unwrap_or_default();
                    jobs.extend(
                        children
                            .into_iter()
                            .filter(|child| {
                                child.file_name().is_some_and(|n| classifier.is_archive(&n.to_string_lossy()))
                            })
                            .map(Job::Archive),
                    );
                }
                jobs
            },
        }
    }
}

/// Immediate regular-file children of `dir`, sorted by name.
pub(crate) fn regular_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Follow symlinks, but skip anything that is not (or no longer) a file.
        if fs::metadata(entry.path()).is_ok_and(|m| m.is_file()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
