//! Main entry point for amichroot.

use amichroot::{run, Cli, CliError};
use amichroot_common::init_logging;
use anyhow::anyhow;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::{debug, error};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&cli.logging_config()).map_err(|e| anyhow!("failed to initialize logging: {e}"))?;
    debug!(command = ?cli.command, "starting amichroot");

    match run(&cli.command, &mut io::stdout(), &mut io::stderr()).await {
        Ok(outcome) => Ok(outcome.exit_code()),
        Err(e @ CliError::Config(_)) => {
            error!("{e}");
            eprintln!("error: {e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
