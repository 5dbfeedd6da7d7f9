use clap::{ArgAction, Parser};
use std::path::PathBuf;
use x360mse_config::Config;

/// Extract Minecraft worlds from Xbox 360 saves, drive dumps and backup
/// archives, then convert them into worlds named after their console titles.
#[derive(Debug, Parser)]
#[command(name = "x360mse", version)]
pub struct Cli {
    /// Directory, save file or archive to extract from. Can be repeated.
    #[arg(short, long = "input", value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Directory staged saves and converted worlds are written to.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Configuration file, layered over the user configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only stage the saves; do not convert them.
    #[arg(long)]
    pub no_convert: bool,

    /// Converter program to run instead of the configured or discovered one.
    #[arg(long, value_name = "PROGRAM")]
    pub converter: Option<PathBuf>,

    /// Number of inputs extracted at the same time.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Thread count hint passed to the converter.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Log more (`-v` for info, `-vv` for debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Overlay the command-line overrides on a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if self.no_convert {
            config.conversion.enabled = false;
        }
        if let Some(program) = &self.converter {
            config.conversion.program = Some(program.clone());
        }
        if let Some(jobs) = self.jobs {
            config.staging.concurrency = jobs;
        }
        if let Some(threads) = self.threads {
            config.conversion.parallelism = Some(threads);
        }
    }
}
