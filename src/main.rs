//! Speech Enhance CLI
//!
//! Command-line interface for batch speech denoising and enhancement.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use speech_enhance::cli::{commands, log_filter, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .init();

    info!("Speech Enhance v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Speech Enhance v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Run(args) => commands::run(&args).with_context(|| {
            format!(
                "processing {} into {}",
                args.in_dir.display(),
                args.out_dir.display()
            )
        }),
        Commands::MockCheckpoint {
            dir,
            denoiser_gain,
            enhancer_gain,
        } => commands::mock_checkpoint(&dir, denoiser_gain, enhancer_gain)
            .context("writing mock checkpoint"),
        Commands::DeviceInfo => commands::device_info().context("resolving device"),
    }
}
