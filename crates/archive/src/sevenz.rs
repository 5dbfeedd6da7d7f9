use crate::error::{Error, ErrorKind, Result};
use crate::progress::copy_with_progress;
use crate::{Archive, ArchiveEntry, ArchiveFormat, ProgressFn};
use exn::ResultExt;
use sevenz_rust2::{Password, SevenZReader};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A 7-Zip archive.
///
/// Entries live in solid blocks, so extraction walks the archive from the
/// start until it reaches the requested entry.
pub(crate) struct SevenZipFile {
    path: PathBuf,
    entries: Vec<ArchiveEntry>,
}

impl SevenZipFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        let reader = SevenZReader::new(file, Password::empty()).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        let entries = reader
            .archive()
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let mut entry = ArchiveEntry::new(index, file.name.clone(), file.size, file.is_directory);
                if file.has_creation_date {
                    entry.created = SystemTime::try_from(file.creation_date).ok();
                }
                if file.has_access_date {
                    entry.accessed = SystemTime::try_from(file.access_date).ok();
                }
                if file.has_last_modified_date {
                    entry.modified = SystemTime::try_from(file.last_modified_date).ok();
                }
                entry
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }
}

impl Archive for SevenZipFile {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        Ok(self.entries.clone())
    }

    fn extract(&mut self, index: usize, sink: &mut dyn Write, on_progress: &mut ProgressFn<'_>) -> Result<u64> {
        if !self.entries.get(index).is_some_and(|e| !e.is_dir) {
            exn::bail!(ErrorKind::EntryNotFound(index));
        }
        let file = File::open(&self.path).or_raise(|| ErrorKind::Open(self.path.clone()))?;
        let mut reader = SevenZReader::new(file, Password::empty()).or_raise(|| ErrorKind::Corrupt)?;
        // Entries are visited block by block, not in listing order, and names
        // need not be unique: match on identity instead.
        let Some(target) = reader.archive().files.get(index).map(std::ptr::from_ref) else {
            exn::bail!(ErrorKind::EntryNotFound(index));
        };

        // The callback can only report the library's own error type, so the
        // outcome for the target entry is carried out of the closure.
        let mut outcome: Option<std::result::Result<u64, Error>> = None;
        reader
            .for_each_entries(|entry, data| {
                if !std::ptr::eq(entry, target) {
                    return Ok(true);
                }
                outcome = Some(copy_with_progress(data, sink, entry.size, on_progress));
                Ok(false)
            })
            .or_raise(|| ErrorKind::Corrupt)?;

        match outcome {
            Some(result) => result,
            None => exn::bail!(ErrorKind::EntryNotFound(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    fn build_7z(dir: &Path) -> PathBuf {
        let staging = dir.join("staging");
        std::fs::create_dir_all(staging.join("Content")).unwrap();
        std::fs::write(staging.join("Content/SaveWorld.bin"), b"world data").unwrap();
        std::fs::write(staging.join("Content/SaveInfo"), b"descriptor").unwrap();
        let path = dir.join("backup.7z");
        sevenz_rust2::compress_to_path(&staging, &path).unwrap();
        path
    }

    #[test]
    fn test_list_and_extract() {
        let temp = tempfile::tempdir().unwrap();
        let path = build_7z(temp.path());

        let mut archive = SevenZipFile::open(&path).unwrap();
        let entries = archive.entries().unwrap();
        let save = entries.iter().find(|e| e.file_name() == "SaveWorld.bin").unwrap();
        assert_eq!(save.size, 10);

        let mut sink = Vec::new();
        let written = archive.extract(save.index, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(written, 10);
        assert_eq!(sink, b"world data");
    }

    #[test]
    fn test_extract_duplicate_names_by_index() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.7z");
        let mut writer = sevenz_rust2::SevenZWriter::create(&path).unwrap();
        for data in [&b"first"[..], &b"second"[..]] {
            writer
                .push_archive_entry(sevenz_rust2::SevenZArchiveEntry::new_file("Content/SaveA.bin"), Some(data))
                .unwrap();
        }
        writer.finish().unwrap();

        let mut archive = SevenZipFile::open(&path).unwrap();
        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 2);
        let mut sink = Vec::new();
        archive.extract(1, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(sink, b"second");
        sink.clear();
        archive.extract(0, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(sink, b"first");
    }

    #[test]
    fn test_extract_cancelled() {
        let temp = tempfile::tempdir().unwrap();
        let path = build_7z(temp.path());

        let mut archive = SevenZipFile::open(&path).unwrap();
        let index = archive.entries().unwrap().iter().find(|e| e.file_name() == "SaveInfo").unwrap().index;
        let err = archive.extract(index, &mut Vec::new(), &mut |_| ControlFlow::Break(())).unwrap_err();
        assert_eq!(*err, ErrorKind::Cancelled);
    }
}
