use crate::error::{ErrorKind, Result};
use crate::progress::copy_with_progress;
use crate::{Archive, ArchiveEntry, ArchiveFormat, ProgressFn};
use exn::ResultExt;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use std::time::{Duration, UNIX_EPOCH};
use time::{Date, Month, PrimitiveDateTime, Time};
use zip::{ExtraField, ZipArchive};

pub(crate) struct ZipFile {
    path: PathBuf,
    inner: ZipArchive<BufReader<File>>,
}

impl ZipFile {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        let inner = ZipArchive::new(BufReader::new(file)).or_raise(|| ErrorKind::Open(path.to_path_buf()))?;
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }
}

impl Archive for ZipFile {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&mut self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::with_capacity(self.inner.len());
        for index in 0..self.inner.len() {
            let file = self.inner.by_index_raw(index).or_raise(|| ErrorKind::Open(self.path.clone()))?;
            let mut entry = ArchiveEntry::new(index, file.name(), file.size(), file.is_dir());
            entry.modified = file.last_modified().and_then(dos_to_system_time);
            for field in file.extra_data_fields() {
                if let ExtraField::ExtendedTimestamp(stamp) = field {
                    entry.modified = stamp.mod_time().map(unix_seconds).or(entry.modified);
                    entry.accessed = stamp.ac_time().map(unix_seconds);
                    entry.created = stamp.cr_time().map(unix_seconds);
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    fn extract(&mut self, index: usize, sink: &mut dyn Write, on_progress: &mut ProgressFn<'_>) -> Result<u64> {
        if index >= self.inner.len() {
            exn::bail!(ErrorKind::EntryNotFound(index));
        }
        let mut file = self.inner.by_index(index).or_raise(|| ErrorKind::Corrupt)?;
        let total = file.size();
        copy_with_progress(&mut file, sink, total, on_progress)
    }
}

fn unix_seconds(seconds: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(seconds))
}

/// DOS timestamps carry no zone. They are read as UTC; the extended
/// timestamp field, when an entry has one, takes precedence.
fn dos_to_system_time(stamp: zip::DateTime) -> Option<SystemTime> {
    let month = Month::try_from(stamp.month()).ok()?;
    let date = Date::from_calendar_date(i32::from(stamp.year()), month, stamp.day()).ok()?;
    let time = Time::from_hms(stamp.hour(), stamp.minute(), stamp.second()).ok()?;
    Some(SystemTime::from(PrimitiveDateTime::new(date, time).assume_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::from_date_and_time(2014, 5, 17, 10, 30, 0).unwrap());
        writer.add_directory("Content/", options).unwrap();
        writer.start_file("Content/SaveWorld.bin", options).unwrap();
        writer.write_all(b"world data").unwrap();
        writer.start_file("Content/SaveInfo", options).unwrap();
        writer.write_all(b"descriptor").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_list_and_extract() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.zip");
        build_zip(&path);

        let mut archive = ZipFile::open(&path).unwrap();
        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].file_name(), "SaveWorld.bin");
        assert_eq!(entries[1].size, 10);
        assert!(entries[1].modified.is_some());
        assert!(entries[1].created.is_none());

        let mut sink = Vec::new();
        let written = archive.extract(1, &mut sink, &mut |_| ControlFlow::Continue(())).unwrap();
        assert_eq!(written, 10);
        assert_eq!(sink, b"world data");
    }

    #[test]
    fn test_dos_time_read_as_utc() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.zip");
        build_zip(&path);

        let mut archive = ZipFile::open(&path).unwrap();
        let entries = archive.entries().unwrap();
        // 2014-05-17T10:30:00Z
        assert_eq!(entries[1].modified, Some(UNIX_EPOCH + Duration::from_secs(1_400_322_600)));
    }

    #[test]
    fn test_extended_timestamp_preferred() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let mut options = zip::write::FullFileOptions::default()
            .last_modified_time(zip::DateTime::from_date_and_time(2014, 5, 17, 10, 30, 0).unwrap());
        // Flags: modification time only.
        let mut field = vec![0b001];
        field.extend_from_slice(&1_400_000_000u32.to_le_bytes());
        options.add_extra_data(0x5455, field.into_boxed_slice(), false).unwrap();
        writer.start_file("SaveA.bin", options).unwrap();
        writer.write_all(b"alpha").unwrap();
        writer.finish().unwrap();

        let mut archive = ZipFile::open(&path).unwrap();
        let entries = archive.entries().unwrap();
        assert_eq!(entries[0].modified, Some(UNIX_EPOCH + Duration::from_secs(1_400_000_000)));
        assert!(entries[0].accessed.is_none());
    }

    #[test]
    fn test_extract_out_of_range() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("backup.zip");
        build_zip(&path);

        let mut archive = ZipFile::open(&path).unwrap();
        let err = archive.extract(9, &mut Vec::new(), &mut |_| ControlFlow::Continue(())).unwrap_err();
        assert_eq!(*err, ErrorKind::EntryNotFound(9));
    }

    #[test]
    fn test_open_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.zip");
        std::fs::write(&path, b"definitely not a zip").unwrap();
        let err = ZipFile::open(&path).err().unwrap();
        assert_eq!(*err, ErrorKind::Open(path));
    }
}
