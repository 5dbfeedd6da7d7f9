//! The Scan–Match–Extract pipeline.
//!
//! 1. Every input is classified into an [`InputSpec`] and expanded into
//!    [`Job`]s.
//! 2. [`stage`] runs the jobs: metadata descriptors are parsed into the shared
//!    [`SaveBinRegistry`], and every save file is written to the output
//!    directory under a collision-free name, decorated with its title when one
//!    is bound.
//! 3. [`convert`] then feeds each staged save to a
//!    [`Converter`](x360mse_convert::Converter) and writes the title into the
//!    converted world.
//!
//! Both drivers report through a [`Stream`](futures::Stream) of events whose
//! `Err` items are isolated failures; the stream keeps going after them.

mod classify;
pub mod convert;
pub mod error;
mod progress;
mod registry;
mod source;
pub mod stage;
mod unique;

pub use crate::classify::{EntryKind, PatternClassifier};
pub use crate::convert::{ConversionOutcome, ConversionStatus, ConvertEvent, convert};
pub use crate::progress::{NoProgress, ProgressSink, ProgressUpdate};
pub use crate::registry::SaveBinRegistry;
pub use crate::source::{InputSpec, Job};
pub use crate::stage::{StageEvent, StagedSave, decorated_name, stage};
pub use crate::unique::unique_path;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use x360mse_config::{Config, Conversion, Staging};
use x360mse_saveinfo::{BinarySaveInfoParser, SaveInfoParser};

/// Everything a pipeline run shares between its jobs.
///
/// Cheap to clone: the registry, parser and progress sink are shared, so
/// clones handed to worker threads all see the same bindings.
#[derive(Clone)]
pub struct Context {
    pub classifier: PatternClassifier,
    pub parser: Arc<dyn SaveInfoParser>,
    pub registry: Arc<SaveBinRegistry>,
    pub staging: Staging,
    pub conversion: Conversion,
    /// Directory staged saves and converted worlds are written to.
    pub output: PathBuf,
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
}

impl Context {
    /// A context with the binary descriptor parser, an empty registry and no
    /// progress reporting.
    pub fn new(config: &Config, output: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            classifier: PatternClassifier::from_config(&config.patterns)?,
            parser: Arc::new(BinarySaveInfoParser),
            registry: Arc::new(SaveBinRegistry::new()),
            staging: config.staging.clone(),
            conversion: config.conversion.clone(),
            output: output.into(),
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_parser(mut self, parser: impl SaveInfoParser + 'static) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_output(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output).or_raise(|| ErrorKind::Output(self.output.clone()))
    }

    /// Classify every input, failing on the first one that is not usable.
    pub fn classify_inputs<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> Result<Vec<InputSpec>> {
        paths.into_iter().map(|path| InputSpec::classify(path, &self.classifier)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::file::tests::FakeConverter;
    use futures::StreamExt;
    use std::fs::File;
    use std::io::Write;
    use x360mse_saveinfo::{DESCRIPTOR_MAGIC, DESCRIPTOR_VERSION};
    use zip::write::SimpleFileOptions;

    fn descriptor(records: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&DESCRIPTOR_MAGIC.to_be_bytes());
        out.extend_from_slice(&DESCRIPTOR_VERSION.to_be_bytes());
        out.extend_from_slice(&(records.len() as u32).to_be_bytes());
        for text in records.iter().flat_map(|(name, title)| [name, title]) {
            let units: Vec<u16> = text.encode_utf16().collect();
            out.extend_from_slice(&(units.len() as u16).to_be_bytes());
            for unit in units {
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
        out
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn write_tar(path: &Path, entries: &[(&str, &[u8])]) {
        let mut tar = tar::Builder::new(File::create(path).unwrap());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(1_400_000_000);
            header.set_cksum();
            tar.append_data(&mut header, name, *data).unwrap();
        }
        tar.finish().unwrap();
    }

    async fn run_stage(ctx: &Context, paths: &[&Path]) -> Vec<Result<StageEvent>> {
        let inputs = ctx.classify_inputs(paths).unwrap();
        stage(ctx, &inputs).collect().await
    }

    fn staged_names(events: &[Result<StageEvent>]) -> Vec<String> {
        let mut names: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                Ok(StageEvent::Staged(save)) => Some(save.file_name()),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_archive_save_named_by_descriptor() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let archive = input.path().join("backup.zip");
        let info = descriptor(&[("SaveProfile.bin", "Steve's World")]);
        write_zip(&archive, &[("SaveInfo", &info), ("SaveProfile.bin", b"profile")]);

        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let events = run_stage(&ctx, &[&archive]).await;
        assert!(events.iter().all(Result::is_ok));
        assert_eq!(staged_names(&events), vec!["Steve's World (SaveProfile).bin"]);

        // A second run into the same directory never overwrites.
        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let events = run_stage(&ctx, &[&archive]).await;
        assert_eq!(staged_names(&events), vec!["Steve's World (SaveProfile) (2).bin"]);
        assert_eq!(std::fs::read(output.path().join("Steve's World (SaveProfile).bin")).unwrap(), b"profile");
    }

    #[tokio::test]
    async fn test_descriptor_in_one_source_names_save_in_tarball() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let archive = input.path().join("backup.tar");
        let info = descriptor(&[("SaveA.bin", "Alpha"), ("SaveB.bin", "Beta")]);
        write_tar(&archive, &[("Content/SaveA.bin", b"a"), ("Content/SaveB.bin", b"b"), ("Content/SaveInfo", &info)]);

        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let events = run_stage(&ctx, &[&archive]).await;
        assert_eq!(staged_names(&events), vec!["Alpha (SaveA).bin", "Beta (SaveB).bin"]);
        assert_eq!(ctx.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_directory_without_descriptor() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("Save1.bin"), b"one").unwrap();

        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let events = run_stage(&ctx, &[input.path()]).await;
        assert_eq!(staged_names(&events), vec!["Save1.bin"]);
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_broken_archive_is_isolated() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let broken = input.path().join("broken.zip");
        std::fs::write(&broken, b"definitely not a zip").unwrap();
        let good = input.path().join("good.zip");
        write_zip(&good, &[("SaveA.bin", b"a")]);

        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let events = run_stage(&ctx, &[&broken, &good]).await;
        let errors: Vec<ErrorKind> = events.iter().filter_map(|e| e.as_ref().err()).map(|e| (**e).clone()).collect();
        assert_eq!(errors, vec![ErrorKind::Source(broken)]);
        assert_eq!(staged_names(&events), vec!["SaveA.bin"]);
        assert!(matches!(events.last(), Some(Ok(StageEvent::Complete))));
    }

    #[test]
    fn test_unrecognised_input_is_classification_error() {
        let input = tempfile::tempdir().unwrap();
        let notes = input.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();
        let ctx = Context::new(&Config::default(), input.path()).unwrap();

        let err = ctx.classify_inputs([&notes]).unwrap_err();
        assert_eq!(*err, ErrorKind::Classification(notes));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_stage_then_convert() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let archive = input.path().join("backup.zip");
        let info = descriptor(&[("SaveProfile.bin", "Steve's World")]);
        write_zip(&archive, &[("SaveProfile.bin", b"profile"), ("SaveOther.bin", b"other"), ("SaveInfo", &info)]);

        let ctx = Context::new(&Config::default(), output.path()).unwrap();
        let staged = run_stage(&ctx, &[&archive]).await;
        assert_eq!(staged_names(&staged), vec!["SaveOther.bin", "Steve's World (SaveProfile).bin"]);

        let converter = Arc::new(FakeConverter::succeeding());
        let events: Vec<_> = convert(&ctx, converter.clone()).collect().await;
        let converted: Vec<&ConversionOutcome> = events
            .iter()
            .filter_map(|e| match e {
                Ok(ConvertEvent::Converted(outcome)) => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].output_dir, output.path().join("Steve's World (SaveProfile)"));
        assert_eq!(converted[0].status, ConversionStatus::Converted { renamed: true });
        assert!(events.iter().any(|e| matches!(e, Err(err) if **err == ErrorKind::BindingNotFound(output.path().join("SaveOther.bin")))));
        assert!(!output.path().join("SaveOther").exists());
    }
}
