//! Default values applied when an option is absent.

use crate::schema::BuildConfig;
use amichroot_common::ChrootMount;
use std::collections::BTreeMap;

/// Identity wrapper: the command runs unchanged.
pub const DEFAULT_COMMAND_WRAPPER: &str = "{{.Command}}";

/// Placeholder the command wrapper must contain exactly once.
pub const COMMAND_PLACEHOLDER: &str = ".Command";

/// Directory the build volume is mounted on.
pub const DEFAULT_MOUNT_PATH: &str = "/mnt/amichroot-volumes/{{.Device}}";

/// First partition of the attached volume.
pub const DEFAULT_MOUNT_PARTITION: &str = "1";

/// Files copied into the chroot when `copy_files` is absent.
pub const DEFAULT_COPY_FILES: &[&str] = &["/etc/resolv.conf"];

/// Mount plan used when `chroot_mounts` is absent or nil, in mount order.
pub const DEFAULT_CHROOT_MOUNTS: &[[&str; 3]] = &[
    ["proc", "proc", "/proc"],
    ["bind", "/dev", "/dev"],
    ["devpts", "devpts", "/dev/pts"],
    ["sysfs", "sysfs", "/sys"],
];

/// The default mount plan.
pub fn default_chroot_mounts() -> Vec<ChrootMount> {
    DEFAULT_CHROOT_MOUNTS
        .iter()
        .map(|[device_type, device_path, mount_point]| {
            ChrootMount::new(*device_type, *device_path, *mount_point)
        })
        .collect()
}

/// The default copy list.
pub fn default_copy_files() -> Vec<String> {
    DEFAULT_COPY_FILES.iter().map(ToString::to_string).collect()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image_name: String::new(),
            source_image_id: String::new(),
            chroot_mounts: default_chroot_mounts(),
            copy_files: default_copy_files(),
            command_wrapper: DEFAULT_COMMAND_WRAPPER.to_string(),
            root_device_name: None,
            ami_block_device_mappings: Vec::new(),
            root_volume_size: None,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            mount_partition: DEFAULT_MOUNT_PARTITION.to_string(),
            mount_options: Vec::new(),
            post_mount_commands: Vec::new(),
            device_path: None,
            nvme_device_path: None,
            passthrough: BTreeMap::new(),
        }
    }
}
