//! Loading option bags from JSON, YAML, or TOML files.

use crate::diagnostics::ValidationResult;
use crate::validator::ConfigValidator;
use crate::value::RawOptions;
use amichroot_common::{AmiChrootError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File formats an option bag can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl OptionsFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(AmiChrootError::UnsupportedFormat(format!(
                "{} (expected .json, .yaml, .yml or .toml)",
                path.display()
            ))),
        }
    }

    /// Lowercase format name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }
}

/// Reads option files from disk.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads and parses the option file.
    pub async fn load(&self) -> Result<RawOptions> {
        let format = OptionsFormat::from_path(&self.path)?;
        let text = tokio::fs::read_to_string(&self.path).await?;
        let options = Self::parse(&text, format)?;
        info!(
            path = %self.path.display(),
            format = format.name(),
            options = options.len(),
            "Loaded build options"
        );
        Ok(options)
    }

    /// Reads the option file and runs the validator over it.
    pub async fn load_and_validate(&self) -> Result<ValidationResult> {
        let options = self.load().await?;
        Ok(ConfigValidator::validate(&options))
    }

    /// Parses option text in the given format.
    ///
    /// The document must be a mapping; an empty document is an empty bag.
    pub fn parse(text: &str, format: OptionsFormat) -> Result<RawOptions> {
        if text.trim().is_empty() {
            debug!(format = format.name(), "empty options document");
            return Ok(RawOptions::new());
        }

        match format {
            OptionsFormat::Json => serde_json::from_str(text)
                .map_err(|e| AmiChrootError::parse(format.name(), e)),
            OptionsFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| AmiChrootError::parse(format.name(), e)),
            OptionsFormat::Toml => {
                toml::from_str(text).map_err(|e| AmiChrootError::parse(format.name(), e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::OptionValue;

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            OptionsFormat::from_path(Path::new("build.json")).unwrap(),
            OptionsFormat::Json
        );
        assert_eq!(
            OptionsFormat::from_path(Path::new("build.YML")).unwrap(),
            OptionsFormat::Yaml
        );
        assert_eq!(
            OptionsFormat::from_path(Path::new("build.toml")).unwrap(),
            OptionsFormat::Toml
        );
        assert!(matches!(
            OptionsFormat::from_path(Path::new("build.ini")),
            Err(AmiChrootError::UnsupportedFormat(_))
        ));
        assert!(OptionsFormat::from_path(Path::new("build")).is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let options = ConfigLoader::parse(
            "ami_name: foo\nchroot_mounts: ~\ncopy_files: []\nroot_volume_size: 15\n",
            OptionsFormat::Yaml,
        )
        .unwrap();

        assert_eq!(options.get("ami_name"), Some(&OptionValue::from("foo")));
        assert_eq!(options.get("chroot_mounts"), Some(&OptionValue::Null));
        assert_eq!(options.get("copy_files"), Some(&OptionValue::List(vec![])));
        assert_eq!(options.get("root_volume_size"), Some(&OptionValue::Int(15)));
    }

    #[test]
    fn test_parse_toml() {
        let options = ConfigLoader::parse(
            "ami_name = \"foo\"\nchroot_mounts = [[\"proc\", \"proc\", \"/proc\"]]\n\n[tags]\nOS = \"linux\"\n",
            OptionsFormat::Toml,
        )
        .unwrap();

        assert_eq!(
            options.get("chroot_mounts"),
            Some(&OptionValue::from(vec![["proc", "proc", "/proc"]]))
        );
        assert!(options.get("tags").unwrap().as_map().is_some());
    }

    #[test]
    fn test_parse_rejects_non_mapping_document() {
        let err = ConfigLoader::parse("[1, 2, 3]", OptionsFormat::Json).unwrap_err();
        assert!(matches!(err, AmiChrootError::Parse { ref format, .. } if format == "json"));
    }

    #[test]
    fn test_parse_empty_document() {
        let options = ConfigLoader::parse("  \n", OptionsFormat::Yaml).unwrap();
        assert!(options.is_empty());
    }
}
