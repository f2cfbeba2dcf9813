//! Errors, warnings, and the aggregated validation result.

use crate::schema::BuildConfig;
use crate::template::TemplateError;
use amichroot_common::AmiChrootError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Broad class of a fatal configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed template, mount tuple, record, or value type.
    Syntax,
    /// A required option is missing or empty.
    MissingField,
    /// Options that are individually valid but not together.
    InvalidCombination,
    /// A value outside its allowed range or shape.
    InvalidValue,
}

/// A fatal configuration error. Any of these blocks the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A template field does not parse.
    #[error("{field}: template syntax error: {source}")]
    Template {
        /// Offending option.
        field: String,
        /// Parser error.
        source: TemplateError,
    },

    /// A value has the wrong type.
    #[error("{field}: expected {expected}, found {found}")]
    InvalidType {
        /// Offending option.
        field: String,
        /// Expected type.
        expected: &'static str,
        /// Type actually supplied.
        found: &'static str,
    },

    /// A chroot mount entry is not a `[type, device, mount point]` triple.
    #[error("{field}[{index}]: mount entries must have exactly 3 elements, found {found}")]
    MountArity {
        /// Offending option.
        field: String,
        /// Index of the entry.
        index: usize,
        /// Number of elements supplied.
        found: usize,
    },

    /// A block device mapping record has a field we do not know.
    #[error("{field}[{index}]: unknown block device mapping field {key:?}")]
    UnknownMappingField {
        /// Offending option.
        field: String,
        /// Index of the record.
        index: usize,
        /// Unknown record key.
        key: String,
    },

    /// A required option is missing or empty.
    #[error("{field}: {description} must be specified")]
    MissingField {
        /// Offending option.
        field: String,
        /// What the option describes.
        description: &'static str,
    },

    /// The command wrapper does not wrap exactly one command.
    #[error("{field}: must contain exactly one {{{{.Command}}}} placeholder, found {found}")]
    CommandPlaceholder {
        /// Offending option.
        field: String,
        /// Number of placeholders found.
        found: usize,
    },

    /// Block device mappings were given without a root device.
    #[error("{mappings}: {root_device} must be set when block device mappings are specified")]
    MappingsWithoutRootDevice {
        /// Mappings option.
        mappings: String,
        /// Root device option.
        root_device: String,
    },

    /// An integer that must be positive is not.
    #[error("{field}: must be a positive integer, got {value}")]
    NonPositive {
        /// Offending option.
        field: String,
        /// Supplied value.
        value: i64,
    },

    /// Any other out-of-range or malformed value.
    #[error("{field}: {message}")]
    InvalidValue {
        /// Offending option.
        field: String,
        /// What is wrong.
        message: String,
    },
}

impl ConfigError {
    /// Taxonomy bucket of this error.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Template { .. }
            | Self::InvalidType { .. }
            | Self::MountArity { .. }
            | Self::UnknownMappingField { .. } => ErrorCategory::Syntax,
            Self::MissingField { .. } => ErrorCategory::MissingField,
            Self::MappingsWithoutRootDevice { .. } => ErrorCategory::InvalidCombination,
            Self::CommandPlaceholder { .. }
            | Self::NonPositive { .. }
            | Self::InvalidValue { .. } => ErrorCategory::InvalidValue,
        }
    }

    /// Option the error is about.
    pub fn field(&self) -> &str {
        match self {
            Self::Template { field, .. }
            | Self::InvalidType { field, .. }
            | Self::MountArity { field, .. }
            | Self::UnknownMappingField { field, .. }
            | Self::MissingField { field, .. }
            | Self::CommandPlaceholder { field, .. }
            | Self::NonPositive { field, .. }
            | Self::InvalidValue { field, .. } => field,
            Self::MappingsWithoutRootDevice { mappings, .. } => mappings,
        }
    }
}

/// A non-fatal advisory. Warnings never block the build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    /// Explicit mappings replace the generated root device mapping.
    #[error(
        "{mappings} is set together with {root_device}: the explicit mappings will overwrite \
         the root device mapping generated from {root_device} and root_volume_size"
    )]
    MappingsOverrideRootDevice {
        /// Mappings option.
        mappings: String,
        /// Root device option.
        root_device: String,
    },

    /// The option is not recognized and was ignored.
    #[error("unknown option {key:?} ignored")]
    UnknownOption {
        /// The unrecognized key.
        key: String,
    },
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Normalized configuration. Not usable for building when `errors` is non-empty.
    pub config: BuildConfig,
    /// Advisories.
    pub warnings: Vec<ConfigWarning>,
    /// Fatal errors.
    pub errors: Vec<ConfigError>,
}

impl ValidationResult {
    /// Returns true when there are no fatal errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fatal errors rendered as text.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// Warnings rendered as text.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    /// Splits the result into a usable config or the errors that block it.
    pub fn into_result(self) -> Result<ValidatedConfig, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(ValidatedConfig {
                config: self.config,
                warnings: self.warnings,
            })
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// A configuration that passed validation, with its advisories.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    /// The normalized configuration.
    pub config: BuildConfig,
    /// Advisories to log.
    pub warnings: Vec<ConfigWarning>,
}

/// Every fatal error of a failed validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ConfigError>);

impl ValidationErrors {
    /// The individual errors.
    pub fn errors(&self) -> &[ConfigError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "* {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationErrors> for AmiChrootError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation {
            count: errors.0.len(),
            details: errors.to_string(),
        }
    }
}
