mod cli;
mod error;
mod logging;
mod report;

use crate::cli::Cli;
use crate::error::{ErrorKind, Result};
use crate::report::{ConsoleProgress, Reporter};
use clap::{CommandFactory, Parser};
use exn::ResultExt;
use futures::StreamExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use x360mse_config::{Config, ConfigLoader};
use x360mse_convert::{CommandConverter, Converter};
use x360mse_pipeline::error::ErrorKind as PipelineErrorKind;
use x360mse_pipeline::{Context, convert, stage};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let Some(output) = cli.output.clone().filter(|_| !cli.inputs.is_empty()) else {
        // Printing help can only fail if stdout is gone.
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match run(&cli, output, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupted, stopping after the current entries");
        cancel.cancel();
    }
}

async fn run(cli: &Cli, output: PathBuf, cancel: CancellationToken) -> Result<()> {
    let start = Instant::now();
    let mut loader = ConfigLoader::new();
    if let Some(file) = &cli.config {
        loader = loader.with_file(file);
    }
    let mut config = loader.load().or_raise(|| ErrorKind::Config)?;
    cli.apply(&mut config);
    config.validate().or_raise(|| ErrorKind::Config)?;

    let mut ctx = Context::new(&config, output).or_raise(|| ErrorKind::Input)?.with_cancel(cancel);
    if let Some(progress) = ConsoleProgress::detect() {
        ctx = ctx.with_progress(Arc::new(progress));
    }
    let mut reporter = Reporter::default();
    reporter.welcome();

    let inputs = ctx.classify_inputs(&cli.inputs).or_raise(|| ErrorKind::Input)?;
    ctx.ensure_output().or_raise(|| ErrorKind::Output)?;

    let mut events = Box::pin(stage(&ctx, &inputs));
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => reporter.stage_event(&event),
            Err(e) if matches!(*e, PipelineErrorKind::Cancelled) => return Err(e).or_raise(|| ErrorKind::Cancelled),
            Err(e) => {
                tracing::debug!("{e:?}");
                reporter.error(&e);
            },
        }
    }

    if !config.conversion.enabled {
        tracing::info!("Conversion disabled");
    } else if let Some(converter) = find_converter(&config) {
        let mut events = Box::pin(convert(&ctx, converter));
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => reporter.convert_event(&event),
                Err(e) if matches!(*e, PipelineErrorKind::Cancelled) => {
                    return Err(e).or_raise(|| ErrorKind::Cancelled);
                },
                Err(e) if e.is_fatal() => return Err(e).or_raise(|| ErrorKind::Output),
                Err(e) => {
                    tracing::debug!("{e:?}");
                    reporter.error(&e);
                },
            }
        }
    } else {
        reporter.conversion_skipped("no converter program configured or found on PATH");
    }

    reporter.finish(start.elapsed());
    Ok(())
}

fn find_converter(config: &Config) -> Option<Arc<dyn Converter>> {
    let found = match &config.conversion.program {
        Some(program) => CommandConverter::new(program),
        None => CommandConverter::discover(),
    };
    match found {
        Ok(converter) => {
            tracing::info!(program = %converter.program().display(), "Using converter");
            Some(Arc::new(converter))
        },
        Err(e) => {
            tracing::warn!("Conversion skipped: {e:?}");
            None
        },
    }
}
