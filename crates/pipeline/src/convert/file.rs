use crate::Context;
use crate::convert::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::instrument;
use x360mse_convert::error::ErrorKind as ConverterErrorKind;
use x360mse_convert::{ConversionFailure, Converter};

/// The result of running the converter on one staged save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    /// The staged save that was converted.
    pub save: PathBuf,
    pub output_dir: PathBuf,
    pub title: Option<String>,
    pub duration: Duration,
    pub status: ConversionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    /// The world was written. `renamed` is `false` when there was no title
    /// to apply, or writing it into `level.dat` failed.
    Converted { renamed: bool },
    Failed(ConversionFailure),
}

/// Convert a single staged save.
///
/// A save without a title binding is rejected with
/// [`BindingNotFound`](ErrorKind::BindingNotFound) before anything is created
/// on disk, unless `conversion.require_binding` is off.
#[instrument(skip_all, fields(save = %save.display()))]
pub fn convert_file(ctx: &Context, converter: &dyn Converter, save: &Path) -> Result<ConversionOutcome> {
    let start = Instant::now();
    let name = save.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let title = match ctx.registry.lookup_by_staged_name(&name) {
        Some(bin) => Some(bin.display_title),
        None if ctx.conversion.require_binding => {
            exn::bail!(ErrorKind::BindingNotFound(save.to_path_buf()));
        },
        None => {
            tracing::debug!("No title binding, converting under the staged name");
            None
        },
    };

    let stem = save.file_stem().unwrap_or(save.as_os_str());
    let output_dir = ctx.output.join(stem);
    std::fs::create_dir_all(&output_dir).or_raise(|| ErrorKind::Output(output_dir.clone()))?;

    let status = match converter.convert(save, &output_dir, ctx.conversion.parallelism(), &ctx.cancel) {
        Ok(status) => status,
        Err(e) if matches!(*e, ConverterErrorKind::Cancelled) => return Err(e).or_raise(|| ErrorKind::Cancelled),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Conversion(save.to_path_buf())),
    };
    let status = match status {
        x360mse_convert::ConversionStatus::Success => {
            let renamed = match &title {
                Some(title) => rename_world(converter, &output_dir, title),
                None => false,
            };
            ConversionStatus::Converted { renamed }
        },
        x360mse_convert::ConversionStatus::Failed(failure) => {
            tracing::warn!(message = %failure.message, frames = failure.trace.len(), "Converter reported a failure");
            ConversionStatus::Failed(failure)
        },
    };

    let duration = start.elapsed();
    tracing::info!(duration_ms = duration.as_millis(), "Save converted");
    Ok(ConversionOutcome {
        save: save.to_path_buf(),
        output_dir,
        title,
        duration,
        status,
    })
}

fn rename_world(converter: &dyn Converter, output_dir: &Path, title: &str) -> bool {
    let level_dat = output_dir.join("level.dat");
    match converter.set_display_name(&level_dat, title) {
        Ok(true) => true,
        Ok(false) => {
            tracing::warn!(path = %level_dat.display(), "World has no Data compound, title not written");
            false
        },
        Err(e) => {
            let kind: &ConverterErrorKind = &e;
            tracing::warn!(path = %level_dat.display(), error = %kind, "Unable to write world title");
            false
        },
    }
}
