use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use x360mse_archive::Progress;

/// A progress report for one entry being extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Name of the entry inside its source.
    pub entry: String,
    pub processed: u64,
    /// Zero when the size is not known in advance.
    pub total: u64,
    /// Set on the last update for an entry.
    pub finished: bool,
}
impl ProgressUpdate {
    /// Completion as a fraction, when the total is known.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| (self.processed as f64 / self.total as f64).min(1.0))
    }
}

/// Receives throttled progress updates. Called from blocking worker threads.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: &ProgressUpdate);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;
impl ProgressSink for NoProgress {
    fn update(&self, _update: &ProgressUpdate) {}
}

/// Per-entry progress state: throttles updates towards a [`ProgressSink`]
/// and turns cancellation into [`ControlFlow::Break`].
pub(crate) struct ProgressContext {
    entry: String,
    interval: Duration,
    last_emit: Option<Instant>,
    processed: u64,
    total: u64,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl ProgressContext {
    pub(crate) fn new(
        entry: impl Into<String>,
        total: u64,
        interval: Duration,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            entry: entry.into(),
            interval,
            last_emit: None,
            processed: 0,
            total,
            sink,
            cancel,
        }
    }

    /// Callback for [`Archive::extract`](x360mse_archive::Archive::extract).
    pub(crate) fn on_progress(&mut self, progress: Progress) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        self.processed = progress.processed;
        if progress.total > 0 {
            self.total = progress.total;
        }
        let now = Instant::now();
        if self.last_emit.is_none_or(|last| now.duration_since(last) >= self.interval) {
            self.last_emit = Some(now);
            self.emit(false);
        }
        ControlFlow::Continue(())
    }

    /// Send the final update for this entry, whatever the throttle says.
    pub(crate) fn finish(&mut self) {
        self.emit(true);
    }

    fn emit(&self, finished: bool) {
        self.sink.update(&ProgressUpdate {
            entry: self.entry.clone(),
            processed: self.processed,
            total: self.total,
            finished,
        });
    }
}
