//! Normalized build configuration produced by the validator.

use crate::value::{OptionValue, RawOptions};
use amichroot_common::ChrootMount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Option names accepted in a raw option bag.
pub mod keys {
    use super::ValueShape;

    /// Templated name of the image to register.
    pub const AMI_NAME: &str = "ami_name";
    /// Identifier of the image the build starts from.
    pub const SOURCE_AMI: &str = "source_ami";
    /// Ordered `[type, device, mount point]` triples.
    pub const CHROOT_MOUNTS: &str = "chroot_mounts";
    /// Files copied from the host into the chroot.
    pub const COPY_FILES: &str = "copy_files";
    /// Template wrapping every command run inside the chroot.
    pub const COMMAND_WRAPPER: &str = "command_wrapper";
    /// Name of the root block device of the registered image.
    pub const ROOT_DEVICE_NAME: &str = "root_device_name";
    /// Block device mappings of the registered image.
    pub const AMI_BLOCK_DEVICE_MAPPINGS: &str = "ami_block_device_mappings";
    /// Size of the root volume in GiB.
    pub const ROOT_VOLUME_SIZE: &str = "root_volume_size";
    /// Templated directory the volume is mounted on.
    pub const MOUNT_PATH: &str = "mount_path";
    /// Partition of the attached volume to mount.
    pub const MOUNT_PARTITION: &str = "mount_partition";
    /// Options passed to `mount -o`.
    pub const MOUNT_OPTIONS: &str = "mount_options";
    /// Commands run after the volume is mounted.
    pub const POST_MOUNT_COMMANDS: &str = "post_mount_commands";
    /// Device path the volume is attached at.
    pub const DEVICE_PATH: &str = "device_path";
    /// Device path the volume appears at on NVMe instances.
    pub const NVME_DEVICE_PATH: &str = "nvme_device_path";

    /// Options the validator understands but hands through untouched,
    /// with the shape their values must have.
    pub const PASSTHROUGH: &[(&str, ValueShape)] = &[
        ("region", ValueShape::String),
        ("skip_region_validation", ValueShape::Bool),
        ("ami_description", ValueShape::String),
        ("ami_virtualization_type", ValueShape::String),
        ("ami_users", ValueShape::StringList),
        ("ami_groups", ValueShape::StringList),
        ("ami_regions", ValueShape::StringList),
        ("tags", ValueShape::Map),
        ("snapshot_tags", ValueShape::Map),
        ("ena_support", ValueShape::Bool),
        ("sriov_support", ValueShape::Bool),
    ];

    /// Options with dedicated validation rules.
    pub const VALIDATED: &[&str] = &[
        AMI_NAME,
        SOURCE_AMI,
        CHROOT_MOUNTS,
        COPY_FILES,
        COMMAND_WRAPPER,
        ROOT_DEVICE_NAME,
        AMI_BLOCK_DEVICE_MAPPINGS,
        ROOT_VOLUME_SIZE,
        MOUNT_PATH,
        MOUNT_PARTITION,
        MOUNT_OPTIONS,
        POST_MOUNT_COMMANDS,
        DEVICE_PATH,
        NVME_DEVICE_PATH,
    ];

    /// Expected shape of a passthrough option, or `None` if `key` is not one.
    pub fn passthrough_shape(key: &str) -> Option<ValueShape> {
        PASSTHROUGH
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, shape)| *shape)
    }
}

/// Shape a passthrough option value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A boolean.
    Bool,
    /// A string.
    String,
    /// A list of strings.
    StringList,
    /// A record.
    Map,
}

impl ValueShape {
    /// Returns true if `value` has this shape. Nil always matches.
    pub fn matches(self, value: &OptionValue) -> bool {
        match (self, value) {
            (_, OptionValue::Null)
            | (Self::Bool, OptionValue::Bool(_))
            | (Self::String, OptionValue::Str(_))
            | (Self::Map, OptionValue::Map(_)) => true,
            (Self::StringList, OptionValue::List(items)) => {
                items.iter().all(|item| item.as_str().is_some())
            }
            _ => false,
        }
    }

    /// Name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::StringList => "list of strings",
            Self::Map => "map",
        }
    }
}

/// Normalized configuration for a chroot image build.
///
/// Only meaningful once [`crate::ConfigValidator::validate`] reported no
/// errors for the options it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Templated image name.
    pub image_name: String,
    /// Source image identifier.
    pub source_image_id: String,
    /// Mounts established inside the chroot, in mount order.
    pub chroot_mounts: Vec<ChrootMount>,
    /// Absolute paths copied into the chroot.
    pub copy_files: Vec<String>,
    /// Template wrapping every command run in the chroot.
    pub command_wrapper: String,
    /// Root block device of the registered image.
    pub root_device_name: Option<String>,
    /// Explicit block device mappings; empty when unset.
    pub ami_block_device_mappings: Vec<BlockDeviceMapping>,
    /// Root volume size in GiB.
    pub root_volume_size: Option<u64>,
    /// Templated mount directory.
    pub mount_path: String,
    /// Partition number to mount; `"0"` mounts the whole device.
    pub mount_partition: String,
    /// Options passed to `mount -o`.
    pub mount_options: Vec<String>,
    /// Templated commands run after mounting.
    pub post_mount_commands: Vec<String>,
    /// Attach device path override.
    pub device_path: Option<String>,
    /// NVMe device path override.
    pub nvme_device_path: Option<String>,
    /// Recognized options handed through unchanged.
    pub passthrough: BTreeMap<String, OptionValue>,
}

impl BuildConfig {
    /// Re-expresses this configuration as an option bag.
    ///
    /// Validating the result yields this same configuration.
    pub fn to_raw_options(&self) -> RawOptions {
        let mut raw = RawOptions::new()
            .with(keys::AMI_NAME, self.image_name.as_str())
            .with(keys::SOURCE_AMI, self.source_image_id.as_str())
            .with(
                keys::CHROOT_MOUNTS,
                self.chroot_mounts
                    .iter()
                    .map(ChrootMount::to_parts)
                    .collect::<Vec<_>>(),
            )
            .with(keys::COPY_FILES, self.copy_files.clone())
            .with(keys::COMMAND_WRAPPER, self.command_wrapper.as_str())
            .with(keys::MOUNT_PATH, self.mount_path.as_str())
            .with(keys::MOUNT_PARTITION, self.mount_partition.as_str())
            .with(keys::MOUNT_OPTIONS, self.mount_options.clone())
            .with(keys::POST_MOUNT_COMMANDS, self.post_mount_commands.clone());

        if let Some(name) = &self.root_device_name {
            raw.insert(keys::ROOT_DEVICE_NAME, name.as_str());
        }
        if !self.ami_block_device_mappings.is_empty() {
            raw.insert(
                keys::AMI_BLOCK_DEVICE_MAPPINGS,
                self.ami_block_device_mappings
                    .iter()
                    .map(BlockDeviceMapping::to_option_value)
                    .collect::<Vec<_>>(),
            );
        }
        if let Some(size) = self.root_volume_size {
            raw.insert(
                keys::ROOT_VOLUME_SIZE,
                i64::try_from(size).unwrap_or(i64::MAX),
            );
        }
        if let Some(path) = &self.device_path {
            raw.insert(keys::DEVICE_PATH, path.as_str());
        }
        if let Some(path) = &self.nvme_device_path {
            raw.insert(keys::NVME_DEVICE_PATH, path.as_str());
        }
        for (key, value) in &self.passthrough {
            raw.insert(key.as_str(), value.clone());
        }
        raw
    }
}

/// Field names of a block device mapping record.
pub mod mapping_keys {
    /// Device name, e.g. `/dev/sdb`.
    pub const DEVICE_NAME: &str = "device_name";
    /// Instance store virtual name.
    pub const VIRTUAL_NAME: &str = "virtual_name";
    /// Snapshot the volume is created from.
    pub const SNAPSHOT_ID: &str = "snapshot_id";
    /// Volume type (`gp3`, `io1`, ...).
    pub const VOLUME_TYPE: &str = "volume_type";
    /// KMS key for encrypted volumes.
    pub const KMS_KEY_ID: &str = "kms_key_id";
    /// Volume size in GiB.
    pub const VOLUME_SIZE: &str = "volume_size";
    /// Provisioned IOPS.
    pub const IOPS: &str = "iops";
    /// Delete the volume with the instance.
    pub const DELETE_ON_TERMINATION: &str = "delete_on_termination";
    /// Encrypt the volume.
    pub const ENCRYPTED: &str = "encrypted";
    /// Suppress the device.
    pub const NO_DEVICE: &str = "no_device";
}

/// One block device of the registered image.
///
/// Every field is optional; an empty record is accepted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    /// Device name, e.g. `/dev/sdb`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Instance store virtual name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_name: Option<String>,
    /// Snapshot the volume is created from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    /// Volume type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    /// KMS key for encrypted volumes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Volume size in GiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<u64>,
    /// Provisioned IOPS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<u64>,
    /// Delete the volume with the instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
    /// Encrypt the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    /// Suppress the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_device: Option<bool>,
}

impl BlockDeviceMapping {
    /// The record as an option value, omitting unset fields.
    pub fn to_option_value(&self) -> OptionValue {
        let mut map = BTreeMap::new();
        let strings = [
            (mapping_keys::DEVICE_NAME, &self.device_name),
            (mapping_keys::VIRTUAL_NAME, &self.virtual_name),
            (mapping_keys::SNAPSHOT_ID, &self.snapshot_id),
            (mapping_keys::VOLUME_TYPE, &self.volume_type),
            (mapping_keys::KMS_KEY_ID, &self.kms_key_id),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                map.insert(key.to_string(), OptionValue::from(value.as_str()));
            }
        }
        for (key, value) in [
            (mapping_keys::VOLUME_SIZE, self.volume_size),
            (mapping_keys::IOPS, self.iops),
        ] {
            if let Some(value) = value {
                map.insert(
                    key.to_string(),
                    OptionValue::Int(i64::try_from(value).unwrap_or(i64::MAX)),
                );
            }
        }
        for (key, value) in [
            (mapping_keys::DELETE_ON_TERMINATION, self.delete_on_termination),
            (mapping_keys::ENCRYPTED, self.encrypted),
            (mapping_keys::NO_DEVICE, self.no_device),
        ] {
            if let Some(value) = value {
                map.insert(key.to_string(), OptionValue::Bool(value));
            }
        }
        OptionValue::Map(map)
    }
}
