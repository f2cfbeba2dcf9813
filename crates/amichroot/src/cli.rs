//! Command line definition.

use amichroot_common::LoggingConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(
    name = "amichroot",
    about = "Validate and normalize chroot machine image build options",
    version
)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `amichroot_config=trace`. `RUST_LOG` takes precedence.
    #[arg(long, global = true, env = "AMICHROOT_LOG", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Action to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Logging setup requested on the command line.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            json_format: self.log_json,
            ..LoggingConfig::default()
        }
    }
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Validate an options file (JSON, YAML or TOML) and print the normalized config
    Validate {
        /// Path to the options file
        file: PathBuf,

        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the built-in defaults
    Defaults {
        /// Output format
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// How results are written to stdout.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable summary
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["amichroot", "validate", "build.yaml", "--format", "json"])
            .unwrap();
        assert_eq!(
            cli.command,
            Command::Validate {
                file: PathBuf::from("build.yaml"),
                format: OutputFormat::Json,
            }
        );
    }

    #[test]
    fn test_parse_defaults_with_global_log_flags() {
        let cli =
            Cli::try_parse_from(["amichroot", "defaults", "--log-level", "debug", "--log-json"])
                .unwrap();
        assert_eq!(
            cli.command,
            Command::Defaults {
                format: OutputFormat::Text
            }
        );
        let logging = cli.logging_config();
        assert_eq!(logging.level, "debug");
        assert!(logging.json_format);
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["amichroot", "validate"]).is_err());
    }
}
