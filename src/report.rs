use std::io::{IsTerminal, Write};
use std::time::Duration;
use x360mse_pipeline::error::ErrorKind;
use x360mse_pipeline::{ConversionOutcome, ConversionStatus, ConvertEvent, ProgressSink, ProgressUpdate, StageEvent};

/// Running totals for the final summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub staged: usize,
    pub titled: usize,
    pub converted: usize,
    pub failed: usize,
    pub errors: usize,
}

/// Prints the user-facing report lines to stdout.
#[derive(Debug, Default)]
pub struct Reporter {
    pub summary: Summary,
}

impl Reporter {
    pub fn welcome(&self) {
        println!("Welcome to X360MSE v{}", env!("CARGO_PKG_VERSION"));
    }

    pub fn stage_event(&mut self, event: &StageEvent) {
        if let Some(line) = self.stage_line(event) {
            println!("{line}");
        }
    }

    pub fn convert_event(&mut self, event: &ConvertEvent) {
        for line in self.convert_lines(event) {
            println!("{line}");
        }
    }

    pub fn error(&mut self, kind: &ErrorKind) {
        self.summary.errors += 1;
        println!("Error: {kind}");
    }

    pub fn conversion_skipped(&self, reason: &str) {
        println!("Skipping conversion: {reason}");
    }

    pub fn finish(&self, elapsed: Duration) {
        let s = &self.summary;
        println!(
            "Done in {} ms: {} save(s) staged ({} titled), {} converted, {} failed, {} error(s)",
            elapsed.as_millis(),
            s.staged,
            s.titled,
            s.converted,
            s.failed,
            s.errors,
        );
    }

    fn stage_line(&mut self, event: &StageEvent) -> Option<String> {
        match event {
            StageEvent::Started | StageEvent::Complete => None,
            StageEvent::DiscoveryComplete(jobs) => Some(format!("Extracting saves from {jobs} source(s)")),
            StageEvent::JobStarted(job) => Some(format!("Reading {job}")),
            StageEvent::DescriptorIngested { name, bindings, .. } => {
                Some(format!("Found {bindings} world title(s) in {name}"))
            },
            StageEvent::Staged(save) => {
                self.summary.staged += 1;
                if save.title.is_some() {
                    self.summary.titled += 1;
                }
                Some(format!(
                    "Staged {} as {} ({} bytes in {} ms)",
                    save.original_name,
                    save.file_name(),
                    save.size,
                    save.duration.as_millis()
                ))
            },
            StageEvent::JobFinished { job, staged, elapsed } => {
                Some(format!("Finished {job}: {staged} save(s) in {} ms", elapsed.as_millis()))
            },
        }
    }

    fn convert_lines(&mut self, event: &ConvertEvent) -> Vec<String> {
        match event {
            ConvertEvent::Started | ConvertEvent::Complete => vec![],
            ConvertEvent::DiscoveryComplete(saves) => vec![format!("Converting {saves} staged save(s)")],
            ConvertEvent::Converted(outcome) => self.outcome_lines(outcome),
        }
    }

    fn outcome_lines(&mut self, outcome: &ConversionOutcome) -> Vec<String> {
        let save = outcome.save.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match &outcome.status {
            ConversionStatus::Converted { renamed } => {
                self.summary.converted += 1;
                let mut line =
                    format!("Converted {save} into {} in {} ms", outcome.output_dir.display(), outcome.duration.as_millis());
                match (&outcome.title, renamed) {
                    (Some(title), true) => line.push_str(&format!(", named \"{title}\"")),
                    (Some(_), false) => line.push_str(", but its title could not be written"),
                    (None, _) => {},
                }
                vec![line]
            },
            ConversionStatus::Failed(failure) => {
                self.summary.failed += 1;
                let mut lines = vec![format!("Failed to convert {save}: {}", failure.message)];
                lines.extend(failure.trace.iter().map(|frame| format!("    at {frame}")));
                lines
            },
        }
    }
}

/// Draws a single self-overwriting progress line on an interactive terminal.
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// `None` when stdout is not a terminal.
    pub fn detect() -> Option<Self> {
        std::io::stdout().is_terminal().then_some(Self)
    }
}

impl ProgressSink for ConsoleProgress {
    fn update(&self, update: &ProgressUpdate) {
        let mut out = std::io::stdout().lock();
        let line = progress_line(update);
        // Output errors only cost us the progress display.
        let _ = if update.finished { write!(out, "\r\x1b[2K") } else { write!(out, "\r\x1b[2K{line}") };
        let _ = out.flush();
    }
}

fn progress_line(update: &ProgressUpdate) -> String {
    match update.ratio() {
        Some(ratio) => format!("{}: {:>3}% ({}/{} bytes)", update.entry, (ratio * 100.0).round(), update.processed, update.total),
        None => format!("{}: {} bytes", update.entry, update.processed),
    }
}
