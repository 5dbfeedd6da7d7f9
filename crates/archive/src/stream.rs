use crate::error::{ErrorKind, Result};
use crate::progress::copy_with_progress;
use crate::{Archive, ArchiveEntry, ArchiveFormat, ProgressFn};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use x360mse_compress::Compression;

/// A single compressed file, presented as an archive with one entry named
/// after the file with its compression suffix removed.
pub(crate) struct CompressedStream {
    path: PathBuf,
    compression: Compression,
    entry: ArchiveEntry,
}

impl CompressedStream {
    pub(crate) fn open(path: &Path, compression: Compression) -> Result<Self> {
        let metadata = std::fs::metadata(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let (name, _) = Compression::split_name(&file_name);
        // The uncompressed size is not recorded by every codec.
        let mut entry = ArchiveEntry::new(0, name, 0, false);
        entry.modified = metadata.modified().ok();
        entry.accessed = metadata.accessed().ok();
        Ok(Self {
            path: path.to_path_buf(),
            compression,
            entry,
        })
    }
}

impl Archive for CompressedStream {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Stream(self.compression)
    }

    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        Ok(vec![self.entry.clone()])
    }

    fn extract(&mut self, index: usize, sink: &mut dyn Write, on_progress: &mut ProgressFn<'_>) -> Result<u64> {
        if index != 0 {
            exn::bail!(ErrorKind::EntryNotFound(index));
        }
        let file = File::open(&self.path).or_raise(|| ErrorKind::Open(self.path.clone()))?;
        let mut reader = self.compression.wrap_reader(BufReader::new(file)).or_raise(|| ErrorKind::Corrupt)?;
        copy_with_progress(&mut reader, sink, 0, on_progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    #[test]
    fn test_single_entry() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("SaveWorld.bin.gz");
        std::fs::write(&path, Compression::Gzip.compress(b"world data").unwrap()).unwrap();

        let mut archive = CompressedStream::open(&path, Compression::Gzip).unwrap();
        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "SaveWorld.bin");
        assert!(entries[0].modified.is_some());

        let mut sink = Vec::new();
        assert_eq!(archive.extract(0, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap(), 10);
        assert_eq!(sink, b"world data");
    }

    #[test]
    fn test_corrupt_stream() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("SaveWorld.bin.bz2");
        std::fs::write(&path, b"not bzip2 at all").unwrap();

        let mut archive = CompressedStream::open(&path, Compression::Bzip2).unwrap();
        let err = archive.extract(0, &mut Vec::new(), &mut |_| ControlFlow::Continue(())).unwrap_err();
        assert_eq!(*err, ErrorKind::Corrupt);
    }
}
