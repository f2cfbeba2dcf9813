//! The validation pass: defaults, per-field syntax, and cross-field rules.
//!
//! Every rule is an independent function returning its normalized value
//! together with the diagnostics it produced. [`ConfigValidator::validate`]
//! runs all of them and merges the diagnostics, so a single call reports
//! every problem in the input.

use crate::defaults::{
    default_chroot_mounts, default_copy_files, COMMAND_PLACEHOLDER, DEFAULT_COMMAND_WRAPPER,
    DEFAULT_MOUNT_PARTITION, DEFAULT_MOUNT_PATH,
};
use crate::diagnostics::{ConfigError, ConfigWarning, ValidationResult};
use crate::schema::{keys, mapping_keys, BlockDeviceMapping, BuildConfig};
use crate::template::Template;
use crate::value::{OptionValue, RawOptions};
use amichroot_common::{
    is_absolute_path, is_image_name_char, ChrootMount, IMAGE_NAME_MAX_LEN, IMAGE_NAME_MIN_LEN,
};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Stateless validator for chroot build options.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates `raw`, applying defaults and collecting every error and warning.
    ///
    /// Never fails and never mutates its input: problems are reported in the
    /// returned [`ValidationResult`], and the caller decides whether to abort.
    #[instrument(skip_all, fields(options = raw.len()))]
    pub fn validate(raw: &RawOptions) -> ValidationResult {
        let mut diagnostics = Diagnostics::default();

        let image_name = diagnostics.absorb(check_image_name(raw));
        let command_wrapper = diagnostics.absorb(check_command_wrapper(raw));
        let source_image_id = diagnostics.absorb(check_source_image(raw));
        let chroot_mounts = diagnostics.absorb(check_chroot_mounts(raw));
        let copy_files = diagnostics.absorb(check_copy_files(raw));
        let (root_device_name, ami_block_device_mappings) =
            diagnostics.absorb(check_device_mappings(raw));
        let root_volume_size = diagnostics.absorb(check_root_volume_size(raw));
        let mount_path = diagnostics.absorb(check_mount_path(raw));
        let mount_partition = diagnostics.absorb(check_mount_partition(raw));
        let mount_options = diagnostics.absorb(check_string_list(raw, keys::MOUNT_OPTIONS));
        let post_mount_commands = diagnostics.absorb(check_post_mount_commands(raw));
        let device_path = diagnostics.absorb(check_device_path(raw, keys::DEVICE_PATH));
        let nvme_device_path = diagnostics.absorb(check_device_path(raw, keys::NVME_DEVICE_PATH));
        let passthrough = diagnostics.absorb(check_remaining_options(raw));

        let config = BuildConfig {
            image_name,
            source_image_id,
            chroot_mounts,
            copy_files,
            command_wrapper,
            root_device_name,
            ami_block_device_mappings,
            root_volume_size,
            mount_path,
            mount_partition,
            mount_options,
            post_mount_commands,
            device_path,
            nvme_device_path,
            passthrough,
        };

        debug!(
            errors = diagnostics.errors.len(),
            warnings = diagnostics.warnings.len(),
            "validation finished"
        );

        ValidationResult {
            config,
            warnings: diagnostics.warnings,
            errors: diagnostics.errors,
        }
    }
}

#[derive(Debug, Default)]
struct Diagnostics {
    errors: Vec<ConfigError>,
    warnings: Vec<ConfigWarning>,
}

impl Diagnostics {
    fn absorb<T>(&mut self, checked: Checked<T>) -> T {
        self.errors.extend(checked.diagnostics.errors);
        self.warnings.extend(checked.diagnostics.warnings);
        checked.value
    }
}

/// A rule's normalized value plus what the rule found wrong with it.
#[derive(Debug)]
struct Checked<T> {
    value: T,
    diagnostics: Diagnostics,
}

impl<T> Checked<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            diagnostics: Diagnostics::default(),
        }
    }

    fn with_error(mut self, error: ConfigError) -> Self {
        self.diagnostics.errors.push(error);
        self
    }

    fn with_errors(mut self, errors: impl IntoIterator<Item = ConfigError>) -> Self {
        self.diagnostics.errors.extend(errors);
        self
    }

    fn with_warning(mut self, warning: ConfigWarning) -> Self {
        self.diagnostics.warnings.push(warning);
        self
    }
}

fn invalid_type(field: impl Into<String>, expected: &'static str, found: &OptionValue) -> ConfigError {
    ConfigError::InvalidType {
        field: field.into(),
        expected,
        found: found.type_name(),
    }
}

fn expect_string(field: &str, value: &OptionValue) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| invalid_type(field, "string", value))
}

/// Converts a list of strings, reporting every element of the wrong type.
fn expect_string_list(field: &str, value: &OptionValue) -> Result<Vec<String>, Vec<ConfigError>> {
    let items = value
        .as_list()
        .ok_or_else(|| vec![invalid_type(field, "list of strings", value)])?;

    let mut strings = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => strings.push(s.to_string()),
            None => errors.push(invalid_type(format!("{field}[{index}]"), "string", item)),
        }
    }

    if errors.is_empty() {
        Ok(strings)
    } else {
        Err(errors)
    }
}

/// Absent, nil, and empty strings are all "unset".
fn optional_string(raw: &RawOptions, key: &str) -> Result<Option<String>, ConfigError> {
    raw.get_non_null(key)
        .map(|value| expect_string(key, value))
        .transpose()
        .map(|value| value.filter(|s| !s.is_empty()))
}

fn check_template(field: &str, source: &str) -> Result<Template, ConfigError> {
    Template::parse(source).map_err(|source| ConfigError::Template {
        field: field.to_string(),
        source,
    })
}

fn check_image_name(raw: &RawOptions) -> Checked<String> {
    let missing = || ConfigError::MissingField {
        field: keys::AMI_NAME.to_string(),
        description: "image name",
    };

    let name = match raw.get_non_null(keys::AMI_NAME).map(|v| expect_string(keys::AMI_NAME, v)) {
        None => return Checked::ok(String::new()).with_error(missing()),
        Some(Err(error)) => return Checked::ok(String::new()).with_error(error),
        Some(Ok(name)) => name,
    };

    if name.trim().is_empty() {
        return Checked::ok(name).with_error(missing());
    }

    let template = match check_template(keys::AMI_NAME, &name) {
        Ok(template) => template,
        Err(error) => return Checked::ok(name).with_error(error),
    };

    if template.is_blank() {
        return Checked::ok(name).with_error(missing());
    }

    let mut errors = Vec::new();

    let literal = template.literal_text();
    let mut invalid: Vec<char> = literal.chars().filter(|&c| !is_image_name_char(c)).collect();
    invalid.dedup();
    if !invalid.is_empty() {
        errors.push(ConfigError::InvalidValue {
            field: keys::AMI_NAME.to_string(),
            message: format!(
                "contains characters not allowed in an image name: {invalid:?}; \
                 only alphanumerics, parentheses, square brackets, spaces, periods, \
                 slashes, dashes, single quotes, at-signs and underscores are allowed \
                 (the clean_image_name function replaces the rest)"
            ),
        });
    }

    // Literal text always survives rendering, so its length bounds the rendered
    // length from below. The minimum only applies when nothing is interpolated.
    let length = literal.chars().count();
    let too_short = !template.has_dynamic_content() && length < IMAGE_NAME_MIN_LEN;
    if too_short || length > IMAGE_NAME_MAX_LEN {
        errors.push(ConfigError::InvalidValue {
            field: keys::AMI_NAME.to_string(),
            message: format!(
                "must be between {IMAGE_NAME_MIN_LEN} and {IMAGE_NAME_MAX_LEN} characters long, got {length}"
            ),
        });
    }

    Checked::ok(name).with_errors(errors)
}

fn check_command_wrapper(raw: &RawOptions) -> Checked<String> {
    let Some(value) = raw.get_non_null(keys::COMMAND_WRAPPER) else {
        debug!(field = keys::COMMAND_WRAPPER, "using identity command wrapper");
        return Checked::ok(DEFAULT_COMMAND_WRAPPER.to_string());
    };

    let wrapper = match expect_string(keys::COMMAND_WRAPPER, value) {
        Ok(wrapper) if wrapper.is_empty() => {
            debug!(field = keys::COMMAND_WRAPPER, "empty wrapper, using identity command wrapper");
            return Checked::ok(DEFAULT_COMMAND_WRAPPER.to_string());
        }
        Ok(wrapper) => wrapper,
        Err(error) => return Checked::ok(DEFAULT_COMMAND_WRAPPER.to_string()).with_error(error),
    };

    match check_template(keys::COMMAND_WRAPPER, &wrapper) {
        Err(error) => Checked::ok(wrapper).with_error(error),
        Ok(template) => match template.placeholder_count(COMMAND_PLACEHOLDER) {
            1 => Checked::ok(wrapper),
            found => Checked::ok(wrapper).with_error(ConfigError::CommandPlaceholder {
                field: keys::COMMAND_WRAPPER.to_string(),
                found,
            }),
        },
    }
}

fn check_source_image(raw: &RawOptions) -> Checked<String> {
    match optional_string(raw, keys::SOURCE_AMI) {
        Ok(Some(id)) => Checked::ok(id),
        Ok(None) => Checked::ok(String::new()).with_error(ConfigError::MissingField {
            field: keys::SOURCE_AMI.to_string(),
            description: "source image",
        }),
        Err(error) => Checked::ok(String::new()).with_error(error),
    }
}

fn check_chroot_mounts(raw: &RawOptions) -> Checked<Vec<ChrootMount>> {
    let field = keys::CHROOT_MOUNTS;
    let Some(value) = raw.get_non_null(field) else {
        debug!(field, "using default mount plan");
        return Checked::ok(default_chroot_mounts());
    };

    let Some(entries) = value.as_list() else {
        return Checked::ok(Vec::new()).with_error(invalid_type(field, "list of mount entries", value));
    };
    if entries.is_empty() {
        debug!(field, "empty mount list, using default mount plan");
        return Checked::ok(default_chroot_mounts());
    }

    let mut mounts = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(parts) = entry.as_list() else {
            errors.push(invalid_type(format!("{field}[{index}]"), "list of 3 strings", entry));
            continue;
        };

        if parts.len() != 3 {
            errors.push(ConfigError::MountArity {
                field: field.to_string(),
                index,
                found: parts.len(),
            });
            continue;
        }

        match expect_string_list(&format!("{field}[{index}]"), entry) {
            Ok(strings) => {
                if let Ok(triple) = <[String; 3]>::try_from(strings) {
                    mounts.push(ChrootMount::from(triple));
                }
            }
            Err(element_errors) => errors.extend(element_errors),
        }
    }

    Checked::ok(mounts).with_errors(errors)
}

fn check_copy_files(raw: &RawOptions) -> Checked<Vec<String>> {
    let field = keys::COPY_FILES;
    let Some(value) = raw.get_non_null(field) else {
        debug!(field, "using default copy list");
        return Checked::ok(default_copy_files());
    };

    let files = match expect_string_list(field, value) {
        Ok(files) => files,
        Err(errors) => return Checked::ok(Vec::new()).with_errors(errors),
    };

    let errors: Vec<_> = files
        .iter()
        .enumerate()
        .filter(|(_, path)| !is_absolute_path(path))
        .map(|(index, path)| ConfigError::InvalidValue {
            field: format!("{field}[{index}]"),
            message: format!("{path:?} must be an absolute path"),
        })
        .collect();

    Checked::ok(files).with_errors(errors)
}

fn check_device_mappings(raw: &RawOptions) -> Checked<(Option<String>, Vec<BlockDeviceMapping>)> {
    let mut errors = Vec::new();

    let root_device = optional_string(raw, keys::ROOT_DEVICE_NAME).unwrap_or_else(|error| {
        errors.push(error);
        None
    });

    let field = keys::AMI_BLOCK_DEVICE_MAPPINGS;
    let mut mappings = Vec::new();
    let mut mappings_given = false;
    if let Some(value) = raw.get_non_null(field) {
        match value.as_list() {
            Some(records) => {
                mappings_given = !records.is_empty();
                for (index, record) in records.iter().enumerate() {
                    match parse_mapping(field, index, record) {
                        Ok(mapping) => mappings.push(mapping),
                        Err(record_errors) => errors.extend(record_errors),
                    }
                }
            }
            None => errors.push(invalid_type(field, "list of block device mappings", value)),
        }
    }

    let mut checked = Checked::ok((root_device.clone(), mappings)).with_errors(errors);
    match (root_device.is_some(), mappings_given) {
        (true, true) => {
            checked = checked.with_warning(ConfigWarning::MappingsOverrideRootDevice {
                mappings: field.to_string(),
                root_device: keys::ROOT_DEVICE_NAME.to_string(),
            });
        }
        (false, true) => {
            checked = checked.with_error(ConfigError::MappingsWithoutRootDevice {
                mappings: field.to_string(),
                root_device: keys::ROOT_DEVICE_NAME.to_string(),
            });
        }
        _ => {}
    }
    checked
}

fn parse_mapping(
    field: &str,
    index: usize,
    record: &OptionValue,
) -> Result<BlockDeviceMapping, Vec<ConfigError>> {
    let Some(map) = record.as_map() else {
        return Err(vec![invalid_type(format!("{field}[{index}]"), "map", record)]);
    };

    let mut mapping = BlockDeviceMapping::default();
    let mut errors = Vec::new();

    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        let path = format!("{field}[{index}].{key}");
        let string = || expect_string(&path, value).map(Some);
        let boolean = || {
            value
                .as_bool()
                .map(Some)
                .ok_or_else(|| invalid_type(path.as_str(), "bool", value))
        };
        let count = || match value.as_int() {
            Some(n) => u64::try_from(n).map(Some).map_err(|_| ConfigError::InvalidValue {
                field: path.clone(),
                message: format!("must not be negative, got {n}"),
            }),
            None => Err(invalid_type(path.as_str(), "integer", value)),
        };

        let outcome = match key.as_str() {
            mapping_keys::DEVICE_NAME => string().map(|v| mapping.device_name = v),
            mapping_keys::VIRTUAL_NAME => string().map(|v| mapping.virtual_name = v),
            mapping_keys::SNAPSHOT_ID => string().map(|v| mapping.snapshot_id = v),
            mapping_keys::VOLUME_TYPE => string().map(|v| mapping.volume_type = v),
            mapping_keys::KMS_KEY_ID => string().map(|v| mapping.kms_key_id = v),
            mapping_keys::VOLUME_SIZE => count().map(|v| mapping.volume_size = v),
            mapping_keys::IOPS => count().map(|v| mapping.iops = v),
            mapping_keys::DELETE_ON_TERMINATION => {
                boolean().map(|v| mapping.delete_on_termination = v)
            }
            mapping_keys::ENCRYPTED => boolean().map(|v| mapping.encrypted = v),
            mapping_keys::NO_DEVICE => boolean().map(|v| mapping.no_device = v),
            _ => Err(ConfigError::UnknownMappingField {
                field: field.to_string(),
                index,
                key: key.clone(),
            }),
        };
        if let Err(error) = outcome {
            errors.push(error);
        }
    }

    if errors.is_empty() {
        Ok(mapping)
    } else {
        Err(errors)
    }
}

fn check_root_volume_size(raw: &RawOptions) -> Checked<Option<u64>> {
    let field = keys::ROOT_VOLUME_SIZE;
    match raw.get_non_null(field) {
        None => Checked::ok(None),
        Some(OptionValue::Int(size)) => match u64::try_from(*size) {
            Ok(size) if size > 0 => Checked::ok(Some(size)),
            _ => Checked::ok(None).with_error(ConfigError::NonPositive {
                field: field.to_string(),
                value: *size,
            }),
        },
        Some(other) => Checked::ok(None).with_error(invalid_type(field, "positive integer", other)),
    }
}

fn check_mount_path(raw: &RawOptions) -> Checked<String> {
    let field = keys::MOUNT_PATH;
    let path = match raw.get_non_null(field).map(|v| expect_string(field, v)) {
        None => return Checked::ok(DEFAULT_MOUNT_PATH.to_string()),
        Some(Err(error)) => return Checked::ok(DEFAULT_MOUNT_PATH.to_string()).with_error(error),
        Some(Ok(path)) if path.is_empty() => return Checked::ok(DEFAULT_MOUNT_PATH.to_string()),
        Some(Ok(path)) => path,
    };

    match check_template(field, &path) {
        Ok(_) => Checked::ok(path),
        Err(error) => Checked::ok(path).with_error(error),
    }
}

fn check_mount_partition(raw: &RawOptions) -> Checked<String> {
    let field = keys::MOUNT_PARTITION;
    let invalid = |found: String| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("must be a partition number, got {found}"),
    };

    match raw.get_non_null(field) {
        None => Checked::ok(DEFAULT_MOUNT_PARTITION.to_string()),
        Some(OptionValue::Int(n)) if *n >= 0 => Checked::ok(n.to_string()),
        Some(OptionValue::Int(n)) => {
            Checked::ok(DEFAULT_MOUNT_PARTITION.to_string()).with_error(invalid(n.to_string()))
        }
        Some(OptionValue::Str(s)) if s.is_empty() => Checked::ok(DEFAULT_MOUNT_PARTITION.to_string()),
        Some(OptionValue::Str(s)) if s.chars().all(|c| c.is_ascii_digit()) => Checked::ok(s.clone()),
        Some(OptionValue::Str(s)) => Checked::ok(s.clone()).with_error(invalid(format!("{s:?}"))),
        Some(other) => Checked::ok(DEFAULT_MOUNT_PARTITION.to_string())
            .with_error(invalid_type(field, "partition number", other)),
    }
}

fn check_string_list(raw: &RawOptions, field: &str) -> Checked<Vec<String>> {
    match raw.get_non_null(field).map(|v| expect_string_list(field, v)) {
        None => Checked::ok(Vec::new()),
        Some(Ok(items)) => Checked::ok(items),
        Some(Err(errors)) => Checked::ok(Vec::new()).with_errors(errors),
    }
}

fn check_post_mount_commands(raw: &RawOptions) -> Checked<Vec<String>> {
    let field = keys::POST_MOUNT_COMMANDS;
    let checked = check_string_list(raw, field);
    let errors: Vec<_> = checked
        .value
        .iter()
        .enumerate()
        .filter_map(|(index, command)| check_template(&format!("{field}[{index}]"), command).err())
        .collect();
    checked.with_errors(errors)
}

fn check_device_path(raw: &RawOptions, field: &str) -> Checked<Option<String>> {
    match optional_string(raw, field) {
        Ok(Some(path)) if !is_absolute_path(&path) => {
            let error = ConfigError::InvalidValue {
                field: field.to_string(),
                message: format!("{path:?} must be an absolute path"),
            };
            Checked::ok(Some(path)).with_error(error)
        }
        Ok(path) => Checked::ok(path),
        Err(error) => Checked::ok(None).with_error(error),
    }
}

/// Collects passthrough options and warns about keys nobody understands.
fn check_remaining_options(raw: &RawOptions) -> Checked<BTreeMap<String, OptionValue>> {
    let mut passthrough = BTreeMap::new();
    let mut checked = Checked::ok(());

    for (key, value) in raw.iter() {
        if keys::VALIDATED.contains(&key.as_str()) {
            continue;
        }
        match keys::passthrough_shape(key) {
            Some(shape) if shape.matches(value) => {
                passthrough.insert(key.clone(), value.clone());
            }
            Some(shape) => {
                checked = checked.with_error(invalid_type(key.as_str(), shape.name(), value));
            }
            None => {
                debug!(key = %key, "ignoring unknown option");
                checked = checked.with_warning(ConfigWarning::UnknownOption { key: key.clone() });
            }
        }
    }

    Checked {
        value: passthrough,
        diagnostics: checked.diagnostics,
    }
}
