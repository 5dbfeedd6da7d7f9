use crate::error::{ErrorKind, Result};
use crate::{SaveBin, SaveInfoParser};
use exn::ResultExt;
use std::path::Path;
use tracing::instrument;

/// `SVIF`, big-endian.
pub const DESCRIPTOR_MAGIC: u32 = 0x5356_4946;
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Parser for the console's binary descriptor layout.
///
/// All integers are big-endian:
///
/// ```text
/// u32 magic    "SVIF"
/// u32 version  1
/// u32 count
/// count × {
///     u16 name_len   + name_len  × UTF-16BE code units
///     u16 title_len  + title_len × UTF-16BE code units
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySaveInfoParser;

impl BinarySaveInfoParser {
    /// Parse a descriptor that has already been read into memory.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Vec<SaveBin>> {
        let mut reader = Reader { bytes, offset: 0 };
        let magic = reader.u32("magic")?;
        if magic != DESCRIPTOR_MAGIC {
            exn::bail!(ErrorKind::BadMagic(magic));
        }
        let version = reader.u32("version")?;
        if version != DESCRIPTOR_VERSION {
            exn::bail!(ErrorKind::UnsupportedVersion(version));
        }
        let count = reader.u32("count")?;
        // Never trust the declared count for preallocation: each record needs
        // at least four bytes.
        let mut bins = Vec::with_capacity((count as usize).min(reader.remaining() / 4));
        for _ in 0..count {
            let name = reader.utf16("name")?;
            let title = reader.utf16("title")?;
            bins.push(SaveBin::new(name, title));
        }
        if reader.remaining() > 0 {
            tracing::debug!(trailing = reader.remaining(), "Ignoring trailing bytes after descriptor records");
        }
        Ok(bins)
    }
}

impl SaveInfoParser for BinarySaveInfoParser {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn parse(&self, path: &Path) -> Result<Vec<SaveBin>> {
        let bytes = std::fs::read(path).or_raise(|| ErrorKind::Io)?;
        let bins = self.parse_bytes(&bytes)?;
        tracing::debug!(bindings = bins.len(), "Parsed descriptor");
        Ok(bins)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}
impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            exn::bail!(ErrorKind::Truncated(field));
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u16(&mut self, field: &'static str) -> Result<u16> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn utf16(&mut self, field: &'static str) -> Result<String> {
        let units = usize::from(self.u16(field)?);
        let raw = self.take(units * 2, field)?;
        let units: Vec<u16> = raw.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        String::from_utf16(&units).or_raise(|| ErrorKind::InvalidText(field))
    }
}
