//! CLI Module
//!
//! Command-line interface for batch speech enhancement.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Speech Enhance - denoise and enhance speech recordings
#[derive(Parser, Debug)]
#[command(name = "speech-enhance")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every matching file under a directory
    #[command(name = "run")]
    Run(RunArgs),

    /// Write a mock checkpoint for pipeline checks
    #[command(name = "mock-checkpoint")]
    MockCheckpoint {
        /// Run directory to create
        dir: PathBuf,

        /// Gain applied by the denoiser stage
        #[arg(long, default_value_t = 1.0)]
        denoiser_gain: f32,

        /// Gain applied by the enhancer stage
        #[arg(long, default_value_t = 1.0)]
        enhancer_gain: f32,
    },

    /// Show which compute device `auto` resolves to
    #[command(name = "device-info")]
    DeviceInfo,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory of input recordings
    pub in_dir: PathBuf,

    /// Directory for processed recordings (mirrors the input layout)
    pub out_dir: PathBuf,

    /// Only files ending in this suffix are processed
    #[arg(long, default_value = ".wav")]
    pub suffix: String,

    /// Run the denoiser only
    #[arg(long)]
    pub denoise_only: bool,

    /// Checkpoint run directory (default: download)
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// auto, cpu, cuda[:N] or metal[:N]
    #[arg(long)]
    pub device: Option<String>,

    /// fp32 or fp16
    #[arg(long)]
    pub run_mode: Option<String>,

    /// Number of function evaluations
    #[arg(long, default_value_t = 32)]
    pub nfe: u32,

    /// midpoint, rk4 or euler
    #[arg(long, default_value = "midpoint")]
    pub solver: String,

    /// Denoising strength in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub lambd: f32,

    /// Prior temperature in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub tau: f32,

    /// Time N repeated runs per file and print a JSON report
    #[arg(long)]
    pub bench_runs: Option<usize>,

    /// Input precision policy: match or legacy
    #[arg(long, default_value = "match")]
    pub input_cast: String,
}

/// Log filter from `RUST_LOG` (default `info`), raised to debug by `--verbose`
pub fn log_filter(verbose: bool) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    with_verbosity(base, verbose)
}

fn with_verbosity(filter: EnvFilter, verbose: bool) -> EnvFilter {
    if verbose {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_env_level() {
        let quiet = with_verbosity(EnvFilter::new("warn"), false);
        assert_eq!(quiet.max_level_hint(), Some(LevelFilter::WARN));

        let verbose = with_verbosity(EnvFilter::new("warn"), true);
        assert_eq!(verbose.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_verbose_flag_is_global() {
        let cli = Cli::parse_from(["speech-enhance", "device-info", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::DeviceInfo)));
    }
}
