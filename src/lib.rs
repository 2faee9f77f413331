mod commands;
pub mod core;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Initialize structured logging; stdout is kept for reports
    let fallback = if cli.verbose {
        "info,packsmith=debug"
    } else {
        "info,packsmith=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("packsmith starting...");

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(commands::dispatch(cli))
}
