use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use x360mse_compress::Compression;

/// Every extension treated as an archive or disk image, whether or not this
/// crate can actually decode it.
pub const KNOWN_EXTENSIONS: &[&str] = &[
    "7z", "bz2", "cab", "dmg", "gz", "img", "iso", "rar", "tar", "tbz", "tbz2", "tgz", "txz", "tzst", "vhd", "vhdx",
    "vmdk", "wim", "xz", "zip", "zst",
];

/// A decodable container format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    /// A tarball, wrapped in the given compression layer.
    Tar(Compression),
    /// A single compressed file; the archive has exactly one entry.
    Stream(Compression),
}
impl Display for ArchiveFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Zip => write!(f, "zip"),
            Self::SevenZip => write!(f, "7z"),
            Self::Tar(Compression::None) => write!(f, "tar"),
            Self::Tar(compression) => write!(f, "tar+{compression}"),
            Self::Stream(compression) => write!(f, "{compression}"),
        }
    }
}
impl ArchiveFormat {
    /// Detect the container format from the file name at the end of `path`.
    ///
    /// Names that carry a [known](KNOWN_EXTENSIONS) but undecodable extension
    /// (and names with no recognised extension at all) are rejected with
    /// [`ErrorKind::UnsupportedFormat`].
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let (inner, compression) = Compression::split_name(&name);
        let extension = Path::new(&inner)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Ok(match (extension.as_str(), compression) {
            ("tar", compression) => Self::Tar(compression),
            (_, Compression::None) => match extension.as_str() {
                "zip" => Self::Zip,
                "7z" => Self::SevenZip,
                _ => exn::bail!(ErrorKind::UnsupportedFormat(if extension.is_empty() {
                    name
                } else {
                    extension
                })),
            },
            (_, compression) => Self::Stream(compression),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("backup.zip", ArchiveFormat::Zip)]
    #[case("BACKUP.ZIP", ArchiveFormat::Zip)]
    #[case("backup.7z", ArchiveFormat::SevenZip)]
    #[case("backup.tar", ArchiveFormat::Tar(Compression::None))]
    #[case("backup.tar.gz", ArchiveFormat::Tar(Compression::Gzip))]
    #[case("backup.tgz", ArchiveFormat::Tar(Compression::Gzip))]
    #[case("backup.tar.bz2", ArchiveFormat::Tar(Compression::Bzip2))]
    #[case("backup.txz", ArchiveFormat::Tar(Compression::Xz))]
    #[case("backup.tar.zst", ArchiveFormat::Tar(Compression::Zstd))]
    #[case("SaveWorld.bin.gz", ArchiveFormat::Stream(Compression::Gzip))]
    #[case("/media/usb/SaveWorld.bin.xz", ArchiveFormat::Stream(Compression::Xz))]
    fn test_detect(#[case] path: &str, #[case] expected: ArchiveFormat) {
        assert_eq!(ArchiveFormat::detect(path).unwrap(), expected);
    }

    #[rstest]
    #[case("drive.iso", "iso")]
    #[case("drive.img", "img")]
    #[case("backup.rar", "rar")]
    #[case("README", "README")]
    fn test_detect_unsupported(#[case] path: &str, #[case] reported: &str) {
        let err = ArchiveFormat::detect(path).unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedFormat(reported.to_string()));
    }

    #[test]
    fn test_known_extensions_cover_decodable_formats() {
        for ext in ["zip", "7z", "tar", "gz", "tgz", "bz2", "xz", "zst"] {
            assert!(KNOWN_EXTENSIONS.contains(&ext), "{ext} missing");
        }
        // Kept sorted so the list stays easy to audit.
        assert!(KNOWN_EXTENSIONS.windows(2).all(|w| w[0] < w[1]));
    }
}
