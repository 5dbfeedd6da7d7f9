use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
#[cfg(feature = "xz")]
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
#[cfg(feature = "zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Recognised suffixes, longest first, along with what replaces them once the
/// compression layer has been peeled off (`backup.tgz` is `backup.tar`).
const SUFFIXES: &[(&str, &str)] = &[
    (".tzst", ".tar"),
    (".tbz2", ".tar"),
    (".tbz", ".tar"),
    (".tgz", ".tar"),
    (".txz", ".tar"),
    (".bz2", ""),
    (".zst", ""),
    (".gz", ""),
    (".xz", ""),
];

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl Compression {
    /// Returns the short name of the format (for displaying to the user).
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            #[cfg(feature = "xz")]
            Compression::Xz => "xz",
            #[cfg(feature = "zstd")]
            Compression::Zstd => "zstd",
        }
    }

    /// Split a file name into the name of the stream it wraps and the
    /// compression layer around it.
    ///
    /// Matching is ASCII case-insensitive. A name consisting of nothing but
    /// the suffix (a dotfile such as `.gz`) has no compression.
    ///
    /// ```
    /// use x360mse_compress::Compression;
    ///
    /// assert_eq!(Compression::split_name("SaveWorld.bin.gz"), ("SaveWorld.bin".to_string(), Compression::Gzip));
    /// assert_eq!(Compression::split_name("backup.TGZ"), ("backup.tar".to_string(), Compression::Gzip));
    /// assert_eq!(Compression::split_name("SaveWorld.bin"), ("SaveWorld.bin".to_string(), Compression::None));
    /// ```
    #[must_use]
    pub fn split_name(name: &str) -> (String, Self) {
        for (suffix, replacement) in SUFFIXES {
            let Some(cut) = name.len().checked_sub(suffix.len()) else {
                continue;
            };
            if cut == 0 || !name.is_char_boundary(cut) || !name[cut..].eq_ignore_ascii_case(suffix) {
                continue;
            }
            let Some(compression) = Self::from_suffix(suffix) else {
                continue;
            };
            return (format!("{}{}", &name[..cut], replacement), compression);
        }
        (name.to_string(), Compression::None)
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            ".gz" | ".tgz" => Some(Compression::Gzip),
            ".bz2" | ".tbz" | ".tbz2" => Some(Compression::Bzip2),
            #[cfg(feature = "xz")]
            ".xz" | ".txz" => Some(Compression::Xz),
            #[cfg(feature = "zstd")]
            ".zst" | ".tzst" => Some(Compression::Zstd),
            _ => None,
        }
    }

    /// Detect compression format from magic bytes.
    ///
    /// Returns the `None` variant if nothing matches or the input is too
    /// short to tell.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Compression::Bzip2;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        #[cfg(feature = "xz")]
        if bytes.starts_with(&XZ_MAGIC) {
            return Compression::Xz;
        }
        #[cfg(feature = "zstd")]
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Compression::Zstd;
        }
        Compression::None
    }
}
