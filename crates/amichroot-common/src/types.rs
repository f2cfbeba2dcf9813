//! Common type definitions shared by the validator and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a chroot mount plan.
///
/// Serialized as the same `[device_type, device_path, mount_point]` triple
/// users write in their option files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[String; 3]", into = "[String; 3]")]
pub struct ChrootMount {
    /// Filesystem type handed to `mount -t` (`proc`, `bind`, `sysfs`, ...).
    pub device_type: String,
    /// Source device or directory.
    pub device_path: String,
    /// Mount point, relative to the chroot root.
    pub mount_point: String,
}

impl ChrootMount {
    /// Creates a mount entry.
    pub fn new(
        device_type: impl Into<String>,
        device_path: impl Into<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        Self {
            device_type: device_type.into(),
            device_path: device_path.into(),
            mount_point: mount_point.into(),
        }
    }

    /// Returns the entry as a `[device_type, device_path, mount_point]` triple.
    pub fn to_parts(&self) -> [String; 3] {
        [
            self.device_type.clone(),
            self.device_path.clone(),
            self.mount_point.clone(),
        ]
    }
}

impl From<[String; 3]> for ChrootMount {
    fn from([device_type, device_path, mount_point]: [String; 3]) -> Self {
        Self {
            device_type,
            device_path,
            mount_point,
        }
    }
}

impl From<ChrootMount> for [String; 3] {
    fn from(mount: ChrootMount) -> Self {
        [mount.device_type, mount.device_path, mount.mount_point]
    }
}

impl fmt::Display for ChrootMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.device_type, self.device_path, self.mount_point
        )
    }
}

/// Common result type for the workspace.
pub type Result<T> = std::result::Result<T, AmiChrootError>;

/// Workspace-wide error type.
///
/// Validation diagnostics are not errors of this type: they are collected
/// by the validator and only turned into [`AmiChrootError::Validation`] once
/// a caller decides to abort.
#[derive(thiserror::Error, Debug)]
pub enum AmiChrootError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An option file could not be parsed.
    #[error("Failed to parse {format} options: {message}")]
    Parse {
        /// Format the file was parsed as.
        format: String,
        /// Parser message.
        message: String,
    },

    /// The option file extension is not one we can parse.
    #[error("Unsupported options format: {0}")]
    UnsupportedFormat(String),

    /// The options failed validation.
    #[error("Validation failed with {count} error(s):\n{details}")]
    Validation {
        /// Number of fatal errors.
        count: usize,
        /// One error per line.
        details: String,
    },
}

impl AmiChrootError {
    /// Creates a parse error for the given format.
    pub fn parse(format: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            format: format.into(),
            message: message.to_string(),
        }
    }
}
