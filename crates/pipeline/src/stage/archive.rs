use crate::Context;
use crate::classify::EntryKind;
use crate::progress::ProgressContext;
use crate::stage::error::{ErrorKind, Result};
use crate::stage::{Events, StageEvent, StagedSave, Timestamps, raise_archive, send, stopped, write_staged};
use exn::ResultExt;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use x360mse_archive::{Archive, ArchiveEntry};

/// Stage every save inside the archive at `path`, returning how many were
/// staged.
pub(crate) fn stage_archive(ctx: &Context, path: &Path, events: &Events) -> Result<usize> {
    let mut archive = x360mse_archive::open(path).or_raise(|| ErrorKind::Source(path.to_path_buf()))?;
    let entries = archive.entries().or_raise(|| ErrorKind::Source(path.to_path_buf()))?;
    tracing::debug!(format = %archive.format(), entries = entries.len(), "Archive listed");

    let mut saves: Vec<ArchiveEntry> = Vec::new();
    for entry in entries.into_iter().filter(|e| !e.is_dir) {
        if stopped(ctx, events) {
            exn::bail!(ErrorKind::Cancelled);
        }
        match ctx.classifier.classify_entry(&entry.name) {
            Some(EntryKind::Descriptor) => match ingest_descriptor(ctx, archive.as_mut(), &entry) {
                Ok(bindings) => send(
                    events,
                    Ok(StageEvent::DescriptorIngested {
                        source: path.to_path_buf(),
                        name: entry.name.clone(),
                        bindings,
                    }),
                ),
                Err(e) if matches!(*e, ErrorKind::Cancelled) => return Err(e),
                Err(e) => send(events, Err(e)),
            },
            Some(EntryKind::Save) => saves.push(entry),
            None => tracing::trace!(entry = %entry.name, "Ignoring unrecognised entry"),
        }
    }

    let mut staged = 0;
    for entry in saves {
        if stopped(ctx, events) {
            exn::bail!(ErrorKind::Cancelled);
        }
        match stage_entry(ctx, archive.as_mut(), path, &entry) {
            Ok(save) => {
                staged += 1;
                send(events, Ok(StageEvent::Staged(save)));
            },
            Err(e) if matches!(*e, ErrorKind::Cancelled) => return Err(e),
            Err(e) => send(events, Err(e)),
        }
    }
    Ok(staged)
}

/// Extract a descriptor to a scratch file and feed it to the registry.
fn ingest_descriptor(ctx: &Context, archive: &mut dyn Archive, entry: &ArchiveEntry) -> Result<usize> {
    let raise = || ErrorKind::Descriptor(entry.name.clone());
    let mut scratch = tempfile::NamedTempFile::new().or_raise(raise)?;
    let cancel = ctx.cancel.clone();
    raise_archive(
        archive.extract(entry.index, scratch.as_file_mut(), &mut |_| {
            if cancel.is_cancelled() { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
        }),
        raise(),
    )?;
    scratch.flush().or_raise(raise)?;
    ctx.registry.ingest(scratch.path(), ctx.parser.as_ref()).or_raise(raise)
}

fn stage_entry(ctx: &Context, archive: &mut dyn Archive, source: &Path, entry: &ArchiveEntry) -> Result<StagedSave> {
    let file_name = entry.file_name();
    let title = ctx
        .registry
        .lookup_by_filename(file_name)
        .or_else(|| ctx.registry.lookup_by_staged_name(file_name))
        .map(|bin| bin.display_title);
    let times = Timestamps {
        created: entry.created,
        accessed: entry.accessed,
        modified: entry.modified,
    };
    let mut progress = ProgressContext::new(
        file_name,
        entry.size,
        ctx.staging.progress_interval(),
        ctx.progress.clone(),
        ctx.cancel.clone(),
    );
    let save = write_staged(ctx, source, file_name, title, times, None, |output| {
        raise_archive(
            archive.extract(entry.index, output, &mut |p| progress.on_progress(p)),
            ErrorKind::Entry(entry.name.clone()),
        )
    })?;
    progress.finish();
    Ok(save)
}
