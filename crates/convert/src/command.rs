use crate::error::{ErrorKind, Result};
use crate::{ConversionFailure, ConversionStatus, Converter, TraceFrame};
use exn::ResultExt;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Program names searched for on `PATH` when none is configured.
pub const CONVERTER_CANDIDATES: &[&str] = &["x360-world-converter", "lce-converter", "mcconvert"];

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives an external converter program:
///
/// ```text
/// <program> --input <file> --output <dir> --threads <n>
/// ```
///
/// A zero exit status is success. Otherwise the program is expected to print
/// a JSON status document on stdout:
///
/// ```json
/// {"error": {"message": "...", "trace": [{"file": "...", "line": 42}]}}
/// ```
///
/// The trace is listed outermost frame first, as it was thrown.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
}

impl CommandConverter {
    /// Use the given program, resolving bare names through `PATH`.
    pub fn new(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        let program = if program.components().count() > 1 {
            program.to_path_buf()
        } else {
            which::which(program).or_raise(|| ErrorKind::ConverterNotFound)?
        };
        Ok(Self { program })
    }

    /// Find the first of the [`CONVERTER_CANDIDATES`] on `PATH`.
    pub fn discover() -> Result<Self> {
        for candidate in CONVERTER_CANDIDATES {
            if let Ok(program) = which::which(candidate) {
                tracing::debug!(program = %program.display(), "Discovered converter");
                return Ok(Self { program });
            }
        }
        tracing::info!("No converter executable found in PATH");
        exn::bail!(ErrorKind::ConverterNotFound);
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn wait(&self, child: &mut Child, cancel: &CancellationToken) -> Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait().or_raise(|| ErrorKind::Io)? {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                tracing::debug!(pid = child.id(), "Killing converter");
                // The child may have exited in the meantime; either way it is reaped below.
                let _ = child.kill();
                let _ = child.wait();
                exn::bail!(ErrorKind::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Converter for CommandConverter {
    #[instrument(skip_all, fields(input = %input.display(), program = %self.program.display()))]
    fn convert(
        &self,
        input: &Path,
        output_dir: &Path,
        parallelism: usize,
        cancel: &CancellationToken,
    ) -> Result<ConversionStatus> {
        let mut child = Command::new(&self.program)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output_dir)
            .arg("--threads")
            .arg(parallelism.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .or_raise(|| ErrorKind::Spawn(self.program.clone()))?;
        // Drain both pipes on their own threads so a chatty converter never
        // blocks on a full pipe while we poll for exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = self.wait(&mut child, cancel)?;
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if status.success() {
            tracing::debug!("Converter finished");
            return Ok(ConversionStatus::Success);
        }
        tracing::debug!(code = ?status.code(), "Converter reported failure");
        Ok(ConversionStatus::Failed(parse_failure(&stdout, &stderr, status)))
    }
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut output = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes);
            output = String::from_utf8_lossy(&bytes).into_owned();
        }
        output
    })
}

#[derive(Deserialize)]
struct StatusDocument {
    error: StatusError,
}

#[derive(Deserialize)]
struct StatusError {
    message: String,
    #[serde(default)]
    trace: Vec<TraceFrame>,
}

fn parse_failure(stdout: &str, stderr: &str, status: ExitStatus) -> ConversionFailure {
    match serde_json::from_str::<StatusDocument>(stdout.trim()) {
        Ok(StatusDocument { error }) => ConversionFailure {
            message: error.message,
            trace: error.trace.into_iter().rev().collect(),
        },
        Err(_) => {
            let message = match stderr.trim() {
                "" => format!("converter exited with {status}"),
                stderr => stderr.to_string(),
            };
            ConversionFailure { message, trace: Vec::new() }
        },
    }
}
