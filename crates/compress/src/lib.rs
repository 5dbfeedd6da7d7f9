//! Single-stream compression codecs.
//!
//! Backups of console drives tend to arrive in whatever the person making
//! them had to hand: a `.tar.gz`, a lone `SaveWorld.bin.bz2`, a `.tar.zst`.
//! This crate wraps those codecs behind a single [`Compression`] enum:
//!
//! - **Detection** from a file name ([`Compression::split_name`]), including
//!   the shorthand tarball suffixes (`.tgz`, `.tbz2`, `.txz`, `.tzst`), which
//!   also recovers the inner file name of a compressed stream, or from magic
//!   bytes ([`Compression::from_magic_bytes`]).
//! - **Streaming** decoders/encoders ([`Compression::wrap_reader`],
//!   [`Compression::wrap_writer`]) and in-memory helpers.
//!
//! Gzip and Bzip2 are always available. XZ and Zstd are behind feature flags.

mod construct;
pub mod error;
mod ops;

/// A supported single-stream compression format.
///
/// Defaults to [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}
