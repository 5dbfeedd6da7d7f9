//! Configuration for the save extractor.
//!
//! Sources are layered, lowest precedence first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. `config.toml`, `config.yaml` or `config.json` in the user configuration
//!    directory (`~/.config/x360mse/` on Linux).
//! 3. An explicit file passed to [`ConfigLoader::with_file`].
//! 4. Environment variables prefixed with `X360MSE_`, using `__` to reach
//!    nested keys (`X360MSE_STAGING__CONCURRENCY=8`).
//!
//! Command-line overrides are applied by the caller on the loaded [`Config`],
//! followed by another call to [`Config::validate`].

pub mod error;
mod loader;

pub use crate::loader::ConfigLoader;
use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SAVE_PATTERN: &str = r"^Save(.+)\.bin$";
pub const DEFAULT_DESCRIPTOR_MARKER: &str = "SaveInfo";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub patterns: Patterns,
    pub staging: Staging,
    pub conversion: Conversion,
}

/// How files are recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patterns {
    /// Regular expression a save file name must match in full.
    pub save: String,
    /// Literal substring identifying a metadata descriptor.
    pub descriptor_marker: String,
    /// File extensions (without the dot) treated as archives.
    pub archive_extensions: Vec<String>,
}
impl Default for Patterns {
    fn default() -> Self {
        Self {
            save: DEFAULT_SAVE_PATTERN.to_string(),
            descriptor_marker: DEFAULT_DESCRIPTOR_MARKER.to_string(),
            archive_extensions: x360mse_archive::KNOWN_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Extraction of saves into the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Staging {
    /// Number of inputs extracted at the same time.
    pub concurrency: usize,
    /// Treat archives found directly inside an input directory as inputs too.
    pub nested_archives: bool,
    /// Copy archive entry timestamps onto the staged files.
    pub preserve_timestamps: bool,
    /// Minimum delay between two progress updates for the same entry.
    pub progress_interval_ms: u64,
}
impl Default for Staging {
    fn default() -> Self {
        Self {
            concurrency: 4,
            nested_archives: false,
            preserve_timestamps: true,
            progress_interval_ms: 50,
        }
    }
}
impl Staging {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Conversion of staged saves into worlds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversion {
    pub enabled: bool,
    /// Converter program; discovered on `PATH` when unset.
    pub program: Option<PathBuf>,
    /// Thread count hint passed to the converter; defaults to the number of
    /// available cores.
    pub parallelism: Option<usize>,
    /// Skip saves that have no title binding instead of converting them
    /// under their staged name.
    pub require_binding: bool,
}
impl Default for Conversion {
    fn default() -> Self {
        Self {
            enabled: true,
            program: None,
            parallelism: None,
            require_binding: true,
        }
    }
}
impl Conversion {
    /// The effective thread count hint.
    pub fn parallelism(&self) -> usize {
        self.parallelism
            .unwrap_or_else(|| std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1))
    }
}

impl Config {
    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.staging.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("staging.concurrency must be at least 1".to_string()));
        }
        if self.patterns.save.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("patterns.save must not be empty".to_string()));
        }
        if self.patterns.descriptor_marker.is_empty() {
            exn::bail!(ErrorKind::Invalid("patterns.descriptor_marker must not be empty".to_string()));
        }
        if self.patterns.archive_extensions.iter().all(|e| e.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("patterns.archive_extensions must not be empty".to_string()));
        }
        if self.conversion.parallelism == Some(0) {
            exn::bail!(ErrorKind::Invalid("conversion.parallelism must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.staging.concurrency, 4);
        assert_eq!(config.staging.progress_interval(), Duration::from_millis(50));
        assert!(config.patterns.archive_extensions.iter().any(|e| e == "zip"));
        assert!(config.conversion.parallelism() >= 1);
    }

    #[rstest]
    #[case::no_concurrency(|c: &mut Config| c.staging.concurrency = 0)]
    #[case::blank_pattern(|c: &mut Config| c.patterns.save = "  ".to_string())]
    #[case::no_marker(|c: &mut Config| c.patterns.descriptor_marker.clear())]
    #[case::no_extensions(|c: &mut Config| c.patterns.archive_extensions.clear())]
    #[case::zero_threads(|c: &mut Config| c.conversion.parallelism = Some(0))]
    fn test_invalid(#[case] mutate: fn(&mut Config)) {
        let mut config = Config::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err();
        assert!(matches!(*err, ErrorKind::Invalid(_)));
    }
}
