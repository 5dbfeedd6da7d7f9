use crate::Context;
use crate::convert::error::{ErrorKind as ConvertErrorKind, Result as ConvertResult};
use crate::convert::file::{ConversionOutcome, convert_file};
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use x360mse_convert::Converter;

/// Progress events emitted by [`convert`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of staged saves found.
/// 3. [`Converted`](Self::Converted) or an `Err` item, once per save.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// Failing to list the output directory, or cancellation, ends the stream
/// early with an `Err` item and no [`Complete`](Self::Complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertEvent {
    Started,
    DiscoveryComplete(u64),
    Converted(ConversionOutcome),
    Complete,
}

/// Stream [`ConvertEvent`]s while converting every staged save in the output
/// directory of `ctx`, one at a time, on the blocking pool.
pub fn convert<'a>(ctx: &'a Context, converter: Arc<dyn Converter>) -> impl Stream<Item = LibraryResult<ConvertEvent>> + 'a {
    stream! {
        for await event in convert_inner(ctx, converter) {
            yield match event {
                Ok(event) => Ok(event),
                Err(e) => {
                    let kind = LibraryErrorKind::from(&*e);
                    Err(e).or_raise(|| kind)
                },
            };
        }
    }
}

fn convert_inner<'a>(
    ctx: &'a Context,
    converter: Arc<dyn Converter>,
) -> impl Stream<Item = ConvertResult<ConvertEvent>> + 'a {
    stream!({
        yield Ok(ConvertEvent::Started);

        let saves = match staged_saves(&ctx.output).or_raise(|| ConvertErrorKind::Output(ctx.output.clone())) {
            Ok(saves) => saves,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(ConvertEvent::DiscoveryComplete(u64::try_from(saves.len()).unwrap_or(0)));

        for save in saves {
            if ctx.cancel.is_cancelled() {
                yield Err(exn::Exn::from(ConvertErrorKind::Cancelled));
                return;
            }
            let (job_ctx, converter, path) = (ctx.clone(), converter.clone(), save.clone());
            let joined = tokio::task::spawn_blocking(move || convert_file(&job_ctx, converter.as_ref(), &path)).await;
            match joined {
                Ok(Ok(outcome)) => {
                    yield Ok(ConvertEvent::Converted(outcome));
                },
                Ok(Err(e)) if matches!(*e, ConvertErrorKind::Cancelled) => {
                    yield Err(e);
                    return;
                },
                Ok(Err(e)) => {
                    yield Err(e);
                },
                Err(error) => {
                    tracing::error!(save = %save.display(), %error, "Conversion panicked");
                    yield Err(exn::Exn::from(ConvertErrorKind::Conversion(save)));
                },
            }
        }

        yield Ok(ConvertEvent::Complete);
    })
}

/// Regular `.bin` files directly inside `output`, sorted by name.
fn staged_saves(output: &Path) -> std::io::Result<Vec<PathBuf>> {
    let files = crate::source::regular_files(output)?;
    Ok(files.into_iter().filter(|path| path.extension().is_some_and(|ext| ext == "bin")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConversionStatus;
    use crate::convert::file::tests::FakeConverter;
    use crate::stage::tests::context;
    use futures::StreamExt;
    use x360mse_saveinfo::SaveBin;

    #[tokio::test]
    async fn test_converts_each_staged_save() {
        let output = tempfile::tempdir().unwrap();
        std::fs::write(output.path().join("Alpha (SaveA).bin"), b"a").unwrap();
        std::fs::write(output.path().join("SaveB.bin"), b"b").unwrap();
        std::fs::write(output.path().join("notes.txt"), b"ignored").unwrap();
        let ctx = context(output.path());
        ctx.registry.insert(SaveBin::new("SaveA.bin", "Alpha"));
        let converter = Arc::new(FakeConverter::succeeding());

        let events: Vec<_> = convert(&ctx, converter.clone()).collect().await;
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], Ok(ConvertEvent::Started)));
        assert!(matches!(events[1], Ok(ConvertEvent::DiscoveryComplete(2))));
        let Ok(ConvertEvent::Converted(outcome)) = &events[2] else {
            panic!("unexpected event: {:?}", events[2]);
        };
        assert_eq!(outcome.status, ConversionStatus::Converted { renamed: true });
        assert_eq!(**events[3].as_ref().unwrap_err(), LibraryErrorKind::BindingNotFound(output.path().join("SaveB.bin")));
        assert!(matches!(events[4], Ok(ConvertEvent::Complete)));
        assert!(!output.path().join("SaveB").exists());
        assert_eq!(converter.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_output_directory() {
        let output = tempfile::tempdir().unwrap();
        let missing = output.path().join("missing");
        let ctx = context(&missing);

        let events: Vec<_> = convert(&ctx, Arc::new(FakeConverter::succeeding())).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(**events[1].as_ref().unwrap_err(), LibraryErrorKind::Output(missing));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_save() {
        let output = tempfile::tempdir().unwrap();
        std::fs::write(output.path().join("SaveA.bin"), b"a").unwrap();
        let ctx = context(output.path());
        ctx.cancel.cancel();

        let events: Vec<_> = convert(&ctx, Arc::new(FakeConverter::succeeding())).collect().await;
        assert_eq!(**events.last().unwrap().as_ref().unwrap_err(), LibraryErrorKind::Cancelled);
        assert!(!output.path().join("SaveA").exists());
    }
}
