//! Rendering of validation results and defaults.

use crate::cli::OutputFormat;
use crate::error::CliResult;
use amichroot_config::{
    default_chroot_mounts, default_copy_files, BuildConfig, ConfigError, ErrorCategory,
    ValidationResult, DEFAULT_COMMAND_WRAPPER, DEFAULT_MOUNT_PARTITION, DEFAULT_MOUNT_PATH,
};
use serde::Serialize;
use std::io::Write;

/// Machine readable form of a validation pass.
#[derive(Debug, Serialize)]
pub struct ValidationReport<'a> {
    /// True when there are no fatal errors.
    pub valid: bool,
    /// The normalized config, only present when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a BuildConfig>,
    /// Advisories.
    pub warnings: Vec<String>,
    /// Fatal errors.
    pub errors: Vec<ReportedError<'a>>,
}

/// One fatal error in a [`ValidationReport`].
#[derive(Debug, Serialize)]
pub struct ReportedError<'a> {
    /// Option the error is about.
    pub field: &'a str,
    /// Taxonomy bucket.
    pub category: ErrorCategory,
    /// Rendered message.
    pub message: String,
}

impl<'a> From<&'a ConfigError> for ReportedError<'a> {
    fn from(error: &'a ConfigError) -> Self {
        Self {
            field: error.field(),
            category: error.category(),
            message: error.to_string(),
        }
    }
}

impl<'a> From<&'a ValidationResult> for ValidationReport<'a> {
    fn from(result: &'a ValidationResult) -> Self {
        let valid = result.is_ok();
        Self {
            valid,
            config: valid.then_some(&result.config),
            warnings: result.warning_messages(),
            errors: result.errors.iter().map(ReportedError::from).collect(),
        }
    }
}

/// The built-in defaults, as printed by `amichroot defaults`.
#[derive(Debug, Serialize)]
pub struct DefaultsReport {
    /// Default mount plan as `[type, device, mount point]` triples.
    pub chroot_mounts: Vec<[String; 3]>,
    /// Files copied into the chroot.
    pub copy_files: Vec<String>,
    /// Command wrapper template.
    pub command_wrapper: &'static str,
    /// Mount directory template.
    pub mount_path: &'static str,
    /// Partition mounted.
    pub mount_partition: &'static str,
}

impl Default for DefaultsReport {
    fn default() -> Self {
        Self {
            chroot_mounts: default_chroot_mounts()
                .iter()
                .map(|mount| mount.to_parts())
                .collect(),
            copy_files: default_copy_files(),
            command_wrapper: DEFAULT_COMMAND_WRAPPER,
            mount_path: DEFAULT_MOUNT_PATH,
            mount_partition: DEFAULT_MOUNT_PARTITION,
        }
    }
}

/// Writes a validation result. Errors always go to `err`; the config or JSON report to `out`.
pub fn write_validation(
    result: &ValidationResult,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> CliResult<()> {
    for error in &result.errors {
        writeln!(err, "error: {error}")?;
    }

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &ValidationReport::from(result))?;
            writeln!(out)?;
        }
        OutputFormat::Text if result.is_ok() => write_config_summary(&result.config, out)?,
        OutputFormat::Text => {
            writeln!(err, "{} error(s), configuration is not valid", result.errors.len())?;
        }
    }
    Ok(())
}

/// Writes the defaults table.
pub fn write_defaults(format: OutputFormat, out: &mut impl Write) -> CliResult<()> {
    let defaults = DefaultsReport::default();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &defaults)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            writeln!(out, "chroot mounts:")?;
            for [kind, device, point] in &defaults.chroot_mounts {
                writeln!(out, "  {kind} {device} {point}")?;
            }
            write_list(out, "copy files", &defaults.copy_files)?;
            writeln!(out, "command wrapper: {}", defaults.command_wrapper)?;
            writeln!(out, "mount path: {}", defaults.mount_path)?;
            writeln!(out, "mount partition: {}", defaults.mount_partition)?;
        }
    }
    Ok(())
}

fn write_config_summary(config: &BuildConfig, out: &mut impl Write) -> CliResult<()> {
    writeln!(out, "image name: {}", config.image_name)?;
    writeln!(out, "source image: {}", config.source_image_id)?;
    writeln!(out, "command wrapper: {}", config.command_wrapper)?;
    writeln!(out, "chroot mounts:")?;
    for mount in &config.chroot_mounts {
        writeln!(out, "  {mount}")?;
    }
    write_list(out, "copy files", &config.copy_files)?;
    writeln!(out, "mount path: {}", config.mount_path)?;
    writeln!(out, "mount partition: {}", config.mount_partition)?;
    if let Some(name) = &config.root_device_name {
        writeln!(out, "root device name: {name}")?;
    }
    if let Some(size) = config.root_volume_size {
        writeln!(out, "root volume size: {size} GiB")?;
    }
    if !config.ami_block_device_mappings.is_empty() {
        writeln!(
            out,
            "block device mappings: {}",
            config.ami_block_device_mappings.len()
        )?;
    }
    if !config.post_mount_commands.is_empty() {
        write_list(out, "post mount commands", &config.post_mount_commands)?;
    }
    Ok(())
}

fn write_list(out: &mut impl Write, label: &str, items: &[String]) -> CliResult<()> {
    if items.is_empty() {
        writeln!(out, "{label}: (none)")?;
    } else {
        writeln!(out, "{label}:")?;
        for item in items {
            writeln!(out, "  {item}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amichroot_config::{ConfigValidator, RawOptions};

    fn render(result: &ValidationResult, format: OutputFormat) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        write_validation(result, format, &mut out, &mut err).unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn valid_options() -> RawOptions {
        RawOptions::new()
            .with("ami_name", "foo")
            .with("source_ami", "foo")
    }

    #[test]
    fn test_text_summary_for_valid_config() {
        let result = ConfigValidator::validate(&valid_options());
        let (out, err) = render(&result, OutputFormat::Text);
        assert!(err.is_empty());
        assert!(out.contains("image name: foo"));
        assert!(out.contains("  proc proc /proc"));
        assert!(out.contains("  /etc/resolv.conf"));
    }

    #[test]
    fn test_errors_go_to_stderr() {
        let result = ConfigValidator::validate(&RawOptions::new());
        let (out, err) = render(&result, OutputFormat::Text);
        assert!(out.is_empty());
        assert!(err.contains("error: ami_name: image name must be specified"));
        assert!(err.contains("error: source_ami: source image must be specified"));
        assert!(err.contains("2 error(s)"));
    }

    #[test]
    fn test_json_report_omits_config_when_invalid() {
        let result = ConfigValidator::validate(&RawOptions::new().with("ami_name", "foo"));
        let (out, _) = render(&result, OutputFormat::Json);
        let report: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(report["valid"], false);
        assert!(report.get("config").is_none());
        assert_eq!(report["errors"][0]["field"], "source_ami");
        assert_eq!(report["errors"][0]["category"], "missing_field");
    }

    #[test]
    fn test_defaults_text() {
        let mut out = Vec::new();
        write_defaults(OutputFormat::Text, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("  devpts devpts /dev/pts"));
        assert!(out.contains("command wrapper: {{.Command}}"));
        assert!(out.contains("mount partition: 1"));
    }
}
