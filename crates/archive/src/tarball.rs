use crate::error::{ErrorKind, Result};
use crate::progress::copy_with_progress;
use crate::{Archive, ArchiveEntry, ArchiveFormat, ProgressFn};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x360mse_compress::Compression;

/// A tarball, optionally wrapped in a compression layer.
///
/// Tar has no central directory and compressed tarballs cannot seek, so every
/// call re-reads the archive from the beginning.
pub(crate) struct Tarball {
    path: PathBuf,
    compression: Compression,
}

impl Tarball {
    pub(crate) fn new(path: &Path, compression: Compression) -> Self {
        Self {
            path: path.to_path_buf(),
            compression,
        }
    }

    fn reader(&self) -> Result<tar::Archive<Box<dyn Read>>> {
        let file = File::open(&self.path).or_raise(|| ErrorKind::Open(self.path.clone()))?;
        let reader = self
            .compression
            .wrap_reader(BufReader::new(file))
            .or_raise(|| ErrorKind::Open(self.path.clone()))?;
        Ok(tar::Archive::new(reader))
    }
}

impl Archive for Tarball {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tar(self.compression)
    }

    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut archive = self.reader()?;
        let mut entries = Vec::new();
        for (index, item) in archive.entries().or_raise(|| ErrorKind::Open(self.path.clone()))?.enumerate() {
            let item = item.or_raise(|| ErrorKind::Corrupt)?;
            let header = item.header();
            let name = item.path().or_raise(|| ErrorKind::Corrupt)?.to_string_lossy().into_owned();
            let mut entry = ArchiveEntry::new(index, name, item.size(), header.entry_type().is_dir());
            entry.modified = header.mtime().ok().map(from_unix);
            if let Some(gnu) = header.as_gnu() {
                entry.accessed = gnu.atime().ok().map(from_unix);
                entry.created = gnu.ctime().ok().map(from_unix);
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn extract(&mut self, index: usize, sink: &mut dyn Write, on_progress: &mut ProgressFn<'_>) -> Result<u64> {
        let mut archive = self.reader()?;
        let mut items = archive.entries().or_raise(|| ErrorKind::Open(self.path.clone()))?;
        let Some(item) = items.nth(index) else {
            exn::bail!(ErrorKind::EntryNotFound(index));
        };
        let mut item = item.or_raise(|| ErrorKind::Corrupt)?;
        let total = item.size();
        copy_with_progress(&mut item, sink, total, on_progress)
    }
}

fn from_unix(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ops::ControlFlow;

    fn build_tar(path: &Path, compression: Compression) {
        let file = File::create(path).unwrap();
        let writer = compression.wrap_writer(file).unwrap();
        let mut builder = tar::Builder::new(writer);
        for (name, data) in [("Content/SaveWorld.bin", &b"world data"[..]), ("Content/SaveInfo", &b"info"[..])] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(1_400_000_000);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        }
        builder.into_inner().unwrap().flush().unwrap();
    }

    #[rstest]
    #[case("backup.tar", Compression::None)]
    #[case("backup.tar.gz", Compression::Gzip)]
    #[case("backup.tbz2", Compression::Bzip2)]
    #[case("backup.tar.xz", Compression::Xz)]
    #[case("backup.tzst", Compression::Zstd)]
    fn test_list_and_extract(#[case] name: &str, #[case] compression: Compression) {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(name);
        build_tar(&path, compression);

        let mut archive = Tarball::new(&path, compression);
        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Content/SaveWorld.bin");
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].modified, Some(from_unix(1_400_000_000)));
        assert_eq!(entries[1].file_name(), "SaveInfo");

        let mut sink = Vec::new();
        archive.extract(1, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(sink, b"info");
    }

    #[test]
    fn test_extract_missing_index() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.tar");
        build_tar(&path, Compression::None);

        let mut archive = Tarball::new(&path, Compression::None);
        let err = archive.extract(5, &mut Vec::new(), &mut |_| ControlFlow::Continue(())).unwrap_err();
        assert_eq!(*err, ErrorKind::EntryNotFound(5));
    }
}
