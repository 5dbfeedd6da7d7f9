//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::MultiGzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Minecraft itself writes world metadata at the default gzip level. Nothing
// else in here is ever compressed by us, only decoded.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const GZIP_LEVEL: GzCompression = GzCompression::new(6);
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 6;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

impl Compression {
    /// Compress a byte slice in memory.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut writer = self.wrap_writer(&mut output)?;
        writer.write_all(input).or_raise(|| ErrorKind::Io)?;
        writer.flush().or_raise(|| ErrorKind::Io)?;
        drop(writer);
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use x360mse_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"LevelName").unwrap();
    /// assert_eq!(Compression::Gzip.decompress(&compressed).unwrap(), b"LevelName");
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.wrap_reader(input)?.read_to_end(&mut output).or_raise(|| ErrorKind::Corrupt(self.as_str()))?;
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// Gzip input may contain several concatenated members (as produced by
    /// `pigz` and friends); all of them are decoded.
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Codec(self.as_str()))?),
        })
    }

    /// Wrap a writer with the appropriate compression layer.
    ///
    /// The encoder is finished when the returned writer is dropped; callers
    /// wanting to observe trailing write errors should `flush()` first.
    pub fn wrap_writer<'a, W: Write + 'a>(&self, writer: W) -> Result<Box<dyn Write + 'a>> {
        Ok(match self {
            Compression::None => Box::new(writer),
            Compression::Bzip2 => Box::new(BzEncoder::new(writer, BZIP2_LEVEL)),
            Compression::Gzip => Box::new(GzEncoder::new(writer, GZIP_LEVEL)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzEncoder::new(writer, XZ_LEVEL)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                Box::new(ZstdEncoder::new(writer, ZSTD_LEVEL).or_raise(|| ErrorKind::Codec(self.as_str()))?.auto_finish())
            },
        })
    }
}
