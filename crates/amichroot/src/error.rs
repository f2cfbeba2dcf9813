//! Application-wide error types using thiserror.

use amichroot_common::AmiChrootError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    /// Loading or parsing the options file failed.
    #[error("Configuration error: {0}")]
    Config(#[from] AmiChrootError),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a report failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the command line application.
pub type CliResult<T> = Result<T, CliError>;
