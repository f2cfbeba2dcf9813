//! Subcommand execution.

use crate::cli::{Command, OutputFormat};
use crate::error::CliResult;
use crate::report::{write_defaults, write_validation};
use amichroot_config::ConfigLoader;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

/// Result of a successfully executed subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command did what was asked.
    Success,
    /// The options file has fatal errors.
    Invalid,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Invalid => ExitCode::FAILURE,
        }
    }
}

/// Runs `command`, writing results to `out` and diagnostics to `err`.
pub async fn run(
    command: &Command,
    out: &mut impl Write,
    err: &mut impl Write,
) -> CliResult<Outcome> {
    match command {
        Command::Validate { file, format } => validate(file, *format, out, err).await,
        Command::Defaults { format } => {
            write_defaults(*format, out)?;
            Ok(Outcome::Success)
        }
    }
}

async fn validate(
    path: &Path,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> CliResult<Outcome> {
    let result = ConfigLoader::new(path).load_and_validate().await?;

    for warning in &result.warnings {
        warn!(path = %path.display(), "{warning}");
    }

    write_validation(&result, format, out, err)?;

    if result.is_ok() {
        info!(path = %path.display(), "configuration is valid");
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::Invalid)
    }
}
