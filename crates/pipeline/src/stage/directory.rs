use crate::Context;
use crate::classify::EntryKind;
use crate::progress::ProgressContext;
use crate::source::regular_files;
use crate::stage::error::{ErrorKind, Result};
use crate::stage::{Events, StageEvent, StagedSave, Timestamps, raise_archive, send, stopped, write_staged};
use exn::ResultExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use x360mse_archive::copy_with_progress;

/// Stage every save directly inside `dir`, returning how many were staged.
pub(crate) fn stage_directory(ctx: &Context, dir: &Path, events: &Events) -> Result<usize> {
    let children = regular_files(dir).or_raise(|| ErrorKind::Source(dir.to_path_buf()))?;
    tracing::debug!(files = children.len(), "Directory listed");

    let mut saves: Vec<(PathBuf, String)> = Vec::new();
    for child in children {
        if stopped(ctx, events) {
            exn::bail!(ErrorKind::Cancelled);
        }
        let name = file_name(&child);
        match ctx.classifier.classify_entry(&name) {
            Some(EntryKind::Descriptor) => match ctx.registry.ingest(&child, ctx.parser.as_ref()) {
                Ok(bindings) => send(
                    events,
                    Ok(StageEvent::DescriptorIngested {
                        source: dir.to_path_buf(),
                        name,
                        bindings,
                    }),
                ),
                Err(e) => send(events, Err(e).or_raise(|| ErrorKind::Descriptor(name.clone()))),
            },
            Some(EntryKind::Save) => saves.push((child, name)),
            None => tracing::trace!(file = %name, "Ignoring unrecognised file"),
        }
    }

    let mut staged = 0;
    for (path, name) in saves {
        if stopped(ctx, events) {
            exn::bail!(ErrorKind::Cancelled);
        }
        match stage_file(ctx, dir, &path, &name) {
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

/// Stage a single save file given directly as an input.
pub(crate) fn stage_loose_file(ctx: &Context, path: &Path, events: &Events) -> Result<usize> {
    if stopped(ctx, events) {
        exn::bail!(ErrorKind::Cancelled);
    }
    let save = stage_file(ctx, path, path, &file_name(path))?;
    send(events, Ok(StageEvent::Staged(save)));
    Ok(1)
}

fn stage_file(ctx: &Context, source: &Path, path: &Path, name: &str) -> Result<StagedSave> {
    let title = ctx.registry.lookup_by_filename(name).map(|bin| bin.display_title);
    let mut input = File::open(path).or_raise(|| ErrorKind::Entry(name.to_string()))?;
    let metadata = input.metadata().or_raise(|| ErrorKind::Entry(name.to_string()))?;
    let mut progress = ProgressContext::new(
        name,
        metadata.len(),
        ctx.staging.progress_interval(),
        ctx.progress.clone(),
        ctx.cancel.clone(),
    );
    let times = Timestamps::from(&metadata);
    let save = write_staged(ctx, source, name, title, times, Some(metadata.permissions()), |output| {
        raise_archive(
            copy_with_progress(&mut input, output, metadata.len(), &mut |p| progress.on_progress(p)),
            ErrorKind::Entry(name.to_string()),
        )
    })?;
    progress.finish();
    Ok(save)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::RecordingSink;
    use crate::stage::tests::{collect, context};
    use std::sync::Arc;
    use x360mse_saveinfo::SaveBin;

    #[test]
    fn test_directory_without_descriptor() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("Save1.bin"), b"one").unwrap();
        std::fs::write(input.path().join("notes.txt"), b"ignored").unwrap();
        let ctx = context(output.path());

        let (result, events) = collect(|tx| stage_directory(&ctx, input.path(), tx));
        assert_eq!(result.unwrap(), 1);
        assert!(ctx.registry.is_empty());
        let [Ok(StageEvent::Staged(save))] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(save.path, output.path().join("Save1.bin"));
        assert_eq!(save.title, None);
        assert_eq!(std::fs::read(&save.path).unwrap(), b"one");
    }

    #[test]
    fn test_directory_descriptor_names_saves() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        // Sorted listing puts the save before the descriptor.
        std::fs::write(input.path().join("SaveA.bin"), b"alpha").unwrap();
        std::fs::write(input.path().join("SaveInfo"), b"").unwrap();
        let ctx = context(output.path()).with_parser(crate::stage::tests::FixedParser(vec![SaveBin::new(
            "SaveA.bin",
            "Alpha World",
        )]));

        let (result, events) = collect(|tx| stage_directory(&ctx, input.path(), tx));
        assert_eq!(result.unwrap(), 1);
        assert!(matches!(events[0], Ok(StageEvent::DescriptorIngested { bindings: 1, .. })));
        assert!(output.path().join("Alpha World (SaveA).bin").is_file());
    }

    #[test]
    fn test_progress_finishes_each_entry() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("SaveA.bin"), vec![1u8; 300_000]).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(output.path()).with_progress(sink.clone());

        let (result, _) = collect(|tx| stage_directory(&ctx, input.path(), tx));
        assert_eq!(result.unwrap(), 1);
        let updates = sink.0.lock().unwrap();
        let last = updates.last().unwrap();
        assert_eq!(last.entry, "SaveA.bin");
        assert_eq!((last.processed, last.total), (300_000, 300_000));
        assert!(last.finished);
        assert_eq!(updates.iter().filter(|u| u.finished).count(), 1);
    }

    #[test]
    fn test_unreadable_directory_is_source_error() {
        let output = tempfile::tempdir().unwrap();
        let missing = output.path().join("missing");
        let ctx = context(output.path());
        let (result, _) = collect(|tx| stage_directory(&ctx, &missing, tx));
        assert_eq!(*result.unwrap_err(), ErrorKind::Source(missing));
    }

    #[test]
    fn test_loose_file_uses_existing_binding() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = input.path().join("SaveProfile.bin");
        std::fs::write(&path, b"profile").unwrap();
        std::fs::write(output.path().join("Steve's World (SaveProfile).bin"), b"older").unwrap();
        let ctx = context(output.path());
        ctx.registry.insert(SaveBin::new("SaveProfile.bin", "Steve's World"));

        let (result, events) = collect(|tx| stage_loose_file(&ctx, &path, tx));
        assert_eq!(result.unwrap(), 1);
        let [Ok(StageEvent::Staged(save))] = events.as_slice() else {
            panic!("unexpected events: {events:?}");
        };
        assert_eq!(save.path, output.path().join("Steve's World (SaveProfile) (2).bin"));
        assert_eq!(std::fs::read(output.path().join("Steve's World (SaveProfile).bin")).unwrap(), b"older");
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_copy_keeps_source_mode() {
        use std::os::unix::fs::PermissionsExt;

        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = input.path().join("Save1.bin");
        std::fs::write(&path, b"one").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();
        let ctx = context(output.path());

        let (result, _) = collect(|tx| stage_directory(&ctx, input.path(), tx));
        assert_eq!(result.unwrap(), 1);
        let mode = std::fs::metadata(output.path().join("Save1.bin")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
