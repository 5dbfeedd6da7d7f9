use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::source::{InputSpec, Job};
use crate::stage::archive::stage_archive;
use crate::stage::directory::{stage_directory, stage_loose_file};
use crate::stage::error::{ErrorKind as StageErrorKind, Result as StageResult};
use crate::stage::{Events, StagedSave, send};
use crate::Context;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinError;

/// Progress events emitted by [`stage`].
///
/// Events follow this ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete), exactly once, with the
///    number of jobs.
/// 3. For every job, [`JobStarted`](Self::JobStarted), then its
///    [`DescriptorIngested`](Self::DescriptorIngested) and
///    [`Staged`](Self::Staged) events, then
///    [`JobFinished`](Self::JobFinished). Jobs run concurrently, so events of
///    different jobs interleave. Loose save files are staged last, once every
///    directory and archive has finished.
/// 4. [`Complete`](Self::Complete), exactly once, unless the run was
///    cancelled.
///
/// A job that fails as a whole (its source could not be read) yields an
/// `Err` item in place of [`JobFinished`](Self::JobFinished).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started,
    DiscoveryComplete(u64),
    JobStarted(Job),
    /// A descriptor was parsed and its bindings added to the registry.
    DescriptorIngested { source: std::path::PathBuf, name: String, bindings: usize },
    Staged(StagedSave),
    JobFinished { job: Job, staged: usize, elapsed: Duration },
    Complete,
}

/// Stream [`StageEvent`]s while extracting every save from `inputs` into the
/// output directory of `ctx`.
///
/// Jobs run on the blocking pool, at most `staging.concurrency` at a time.
/// A loose save file has no descriptor of its own, so those jobs wait until
/// every descriptor the other sources carry is in the registry; the name a
/// loose save gets does not depend on input order.
/// Failures of a source, descriptor or entry surface as `Err` items and the
/// stream carries on. Cancelling `ctx.cancel` stops every job at its next
/// entry or progress callback; the stream then yields a final
/// [`Cancelled`](LibraryErrorKind::Cancelled) error instead of
/// [`Complete`](StageEvent::Complete). Dropping the stream stops the jobs the
/// same way.
pub fn stage<'a>(ctx: &'a Context, inputs: &'a [InputSpec]) -> impl Stream<Item = LibraryResult<StageEvent>> + 'a {
    stream! {
        for await event in stage_inner(ctx, inputs) {
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

enum Step {
    Event(StageResult<StageEvent>),
    Finished(Job, Result<(), JoinError>),
}

fn stage_inner<'a>(ctx: &'a Context, inputs: &'a [InputSpec]) -> impl Stream<Item = StageResult<StageEvent>> + 'a {
    stream!({
        yield Ok(StageEvent::Started);

        let (mut deferred, mut pending): (VecDeque<Job>, VecDeque<Job>) = inputs
            .iter()
            .flat_map(|input| input.jobs(&ctx.classifier, ctx.staging.nested_archives))
            .partition(|job| matches!(job, Job::LooseFile(_)));
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        yield Ok(StageEvent::DiscoveryComplete(u64::try_from(pending.len() + deferred.len()).unwrap_or(0)));

        let (tx, mut rx) = mpsc::unbounded_channel();
        // Dropped once every job has been handed out, so the channel closes
        // when the last running job finishes.
        let mut sender = Some(tx);
        let mut running = FuturesUnordered::new();
        let concurrency = ctx.staging.concurrency.max(1);
        loop {
            if ctx.cancel.is_cancelled() {
                pending.clear();
                deferred.clear();
            }
            if pending.is_empty() && running.is_empty() {
                pending.append(&mut deferred);
            }
            if let Some(tx) = &sender {
                while running.len() < concurrency {
                    let Some(job) = pending.pop_front() else { break };
                    let (job_ctx, events) = (ctx.clone(), tx.clone());
                    let handle = tokio::task::spawn_blocking({
                        let job = job.clone();
                        move || run_job(&job_ctx, job, &events)
                    });
                    running.push(async move { (job, handle.await) });
                }
            }
            if pending.is_empty() && deferred.is_empty() {
                sender = None;
            }

            let step = tokio::select! {
                Some(event) = rx.recv() => Step::Event(event),
                Some((job, joined)) = running.next() => Step::Finished(job, joined),
                else => break,
            };
            match step {
                Step::Event(event) => {
                    yield event;
                },
                Step::Finished(job, Err(error)) => {
                    tracing::error!(%job, %error, "Job panicked");
                    yield Err(exn::Exn::from(StageErrorKind::Source(job.path().to_path_buf())));
                },
                Step::Finished(_, Ok(())) => {},
            }
        }

        if ctx.cancel.is_cancelled() {
            yield Err(exn::Exn::from(StageErrorKind::Cancelled));
            return;
        }
        yield Ok(StageEvent::Complete);
    })
}

fn run_job(ctx: &Context, job: Job, events: &Events) {
    let span = tracing::info_span!("job", %job);
    let _enter = span.enter();
    send(events, Ok(StageEvent::JobStarted(job.clone())));
    let start = Instant::now();
    let result = match &job {
        Job::Directory(path) => stage_directory(ctx, path, events),
        Job::LooseFile(path) => stage_loose_file(ctx, path, events),
        Job::Archive(path) => stage_archive(ctx, path, events),
    };
    match result {
        Ok(staged) => {
            let elapsed = start.elapsed();
            tracing::info!(staged, elapsed_ms = elapsed.as_millis(), "Job finished");
            send(events, Ok(StageEvent::JobFinished { job, staged, elapsed }));
        },
        Err(e) if matches!(*e, StageErrorKind::Cancelled) => tracing::debug!("Job cancelled"),
        Err(e) => {
            let kind: &StageErrorKind = &e;
            tracing::warn!(error = %kind, "Job failed");
            send(events, Err(e));
        },
    }
}
