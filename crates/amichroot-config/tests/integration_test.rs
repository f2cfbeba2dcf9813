//! Integration tests for amichroot-config crate.

use amichroot_common::test_utils::{assert_contains_message, init_test_logging};
use amichroot_config::test_utils::{base_options as test_config, empty_mapping};
use amichroot_config::{
    default_chroot_mounts, BuildConfig, ConfigError, ConfigLoader, ConfigValidator,
    ConfigWarning, ErrorCategory, OptionValue, RawOptions,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[test]
fn test_prepare_ami_name() {
    init_test_logging();
    let mut config = test_config();

    // Test good
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "should not have error: {:?}", result.errors);

    // Test bad
    config.insert("ami_name", "foo {{");
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(!result.errors.is_empty(), "should have error");
    assert_eq!(result.errors[0].field(), "ami_name");

    // Test bad
    config.remove("ami_name");
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(!result.errors.is_empty(), "should have error");
}

#[test]
fn test_prepare_chroot_mounts_nil() {
    let config = test_config().with("chroot_mounts", OptionValue::Null);

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
    assert_eq!(result.config.chroot_mounts, default_chroot_mounts());
    assert_eq!(result.config.chroot_mounts.len(), 4);
}

#[test]
fn test_prepare_chroot_mounts_absent() {
    let result = ConfigValidator::validate(&test_config());
    let points: Vec<_> = result
        .config
        .chroot_mounts
        .iter()
        .map(|mount| mount.mount_point.as_str())
        .collect();
    assert_eq!(points, ["/proc", "/dev", "/dev/pts", "/sys"]);
}

#[test]
fn test_prepare_chroot_mounts_bad_arity() {
    let config = test_config().with("chroot_mounts", vec![vec!["bad"]]);

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert_eq!(
        result.errors,
        vec![ConfigError::MountArity {
            field: "chroot_mounts".to_string(),
            index: 0,
            found: 1,
        }]
    );
}

#[test]
fn test_prepare_chroot_mounts_preserve_order_and_duplicates() {
    let mounts = vec![
        ["sysfs", "sysfs", "/sys"],
        ["proc", "proc", "/proc"],
        ["proc", "proc", "/proc"],
    ];
    let result = ConfigValidator::validate(&test_config().with("chroot_mounts", mounts));

    assert!(result.is_ok());
    let points: Vec<_> = result
        .config
        .chroot_mounts
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        points,
        ["sysfs sysfs /sys", "proc proc /proc", "proc proc /proc"]
    );
}

#[test]
fn test_prepare_source_ami() {
    let mut config = test_config();

    config.insert("source_ami", "");
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert_contains_message(&result.errors, "source image must be specified");
    assert_eq!(result.errors[0].category(), ErrorCategory::MissingField);

    config.remove("source_ami");
    assert!(!ConfigValidator::validate(&config).is_ok());

    config.insert("source_ami", "foo");
    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
}

#[test]
fn test_prepare_command_wrapper() {
    let config = test_config().with("command_wrapper", "echo hi; {{.Command}}");

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
    assert_eq!(result.config.command_wrapper, "echo hi; {{.Command}}");
}

#[test]
fn test_prepare_command_wrapper_default() {
    let result = ConfigValidator::validate(&test_config());
    assert_eq!(result.config.command_wrapper, "{{.Command}}");
}

#[test]
fn test_prepare_copy_files() {
    let result = ConfigValidator::validate(&test_config());
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
    assert_eq!(result.config.copy_files, ["/etc/resolv.conf"]);
}

#[test]
fn test_prepare_copy_files_no_default() {
    let config = test_config().with("copy_files", Vec::<String>::new());

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
    assert!(result.config.copy_files.is_empty());
}

#[test]
fn test_prepare_root_device_name_and_ami_mappings() {
    let config = test_config()
        .with("root_device_name", "/dev/sda")
        .with("ami_block_device_mappings", vec![empty_mapping()])
        .with("root_volume_size", 15);

    let result = ConfigValidator::validate(&config);
    assert_eq!(
        result.warnings.len(),
        1,
        "expected exactly one warning: {:?}",
        result.warnings
    );
    assert!(matches!(
        result.warnings[0],
        ConfigWarning::MappingsOverrideRootDevice { .. }
    ));
    assert!(result.errors.is_empty(), "should not have error: {:?}", result.errors);
    assert_eq!(result.config.root_volume_size, Some(15));
    assert_eq!(result.config.ami_block_device_mappings.len(), 1);
}

#[test]
fn test_prepare_ami_mappings_no_root_device_name() {
    let config = test_config().with("ami_block_device_mappings", vec![empty_mapping()]);

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0].category(),
        ErrorCategory::InvalidCombination
    );
}

#[test]
fn test_prepare_root_device_name_no_ami_mappings() {
    let config = test_config().with("root_device_name", "/dev/sda");

    let result = ConfigValidator::validate(&config);
    assert!(result.warnings.is_empty(), "bad: {:?}", result.warnings);
    assert!(result.errors.is_empty(), "err: {:?}", result.errors);
    assert_eq!(result.config.root_device_name.as_deref(), Some("/dev/sda"));
}

#[test]
fn test_prepare_root_volume_size_must_be_positive() {
    let result = ConfigValidator::validate(&test_config().with("root_volume_size", 0));
    assert_eq!(
        result.errors,
        vec![ConfigError::NonPositive {
            field: "root_volume_size".to_string(),
            value: 0,
        }]
    );
}

#[test]
fn test_unknown_option_is_a_warning() {
    let result = ConfigValidator::validate(&test_config().with("mount_pth", "/mnt"));
    assert!(result.is_ok());
    assert_contains_message(&result.warnings, "mount_pth");
}

#[test]
fn test_validation_does_not_mutate_input() {
    let config = test_config().with("chroot_mounts", OptionValue::Null);
    let before = config.clone();
    let _ = ConfigValidator::validate(&config);
    assert_eq!(config, before);
}

#[test]
fn test_into_result() {
    let ok = ConfigValidator::validate(&test_config().with("root_device_name", "/dev/sda"))
        .into_result()
        .unwrap();
    assert!(ok.warnings.is_empty());
    assert_eq!(ok.config.source_image_id, "foo");

    let errors = ConfigValidator::validate(&RawOptions::new())
        .into_result()
        .unwrap_err();
    assert_eq!(errors.errors().len(), 2);
    assert!(errors.to_string().contains("ami_name: image name must be specified"));
}

#[test]
fn test_validation_is_idempotent() {
    let mut record = BTreeMap::new();
    record.insert("device_name".to_string(), OptionValue::from("/dev/sdb"));
    record.insert("volume_size".to_string(), OptionValue::Int(8));

    let inputs = [
        test_config(),
        test_config().with("copy_files", Vec::<String>::new()),
        test_config()
            .with("root_device_name", "/dev/sda")
            .with("ami_block_device_mappings", vec![OptionValue::Map(record)])
            .with("root_volume_size", 15),
        test_config()
            .with("command_wrapper", "sudo {{.Command}}")
            .with("mount_partition", 2)
            .with("post_mount_commands", vec!["echo {{.Device}}"])
            .with("tags", {
                let mut tags = BTreeMap::new();
                tags.insert("OS".to_string(), OptionValue::from("linux"));
                tags
            }),
    ];

    for input in inputs {
        let first = ConfigValidator::validate(&input);
        assert!(first.is_ok(), "{:?}", first.errors);

        let second = ConfigValidator::validate(&first.config.to_raw_options());
        assert_eq!(second.config, first.config);
        assert_eq!(second.errors, first.errors);
        assert_eq!(second.warnings, first.warnings);
    }
}

#[test]
fn test_build_config_serializes() {
    let result = ConfigValidator::validate(&test_config());
    let json = serde_json::to_value(&result.config).unwrap();
    assert_eq!(json["image_name"], "foo");
    assert_eq!(json["chroot_mounts"][0], serde_json::json!(["proc", "proc", "/proc"]));
    assert_eq!(json["passthrough"]["region"], "us-east-1");

    let back: BuildConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, result.config);
}

#[tokio::test]
async fn test_loader_reads_and_validates_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("build.yaml");
    std::fs::write(
        &path,
        "ami_name: foo\nsource_ami: foo\nregion: us-east-1\ncopy_files: []\nchroot_mounts:\n  - [proc, proc, /proc]\n",
    )
    .unwrap();

    let result = ConfigLoader::new(&path).load_and_validate().await.unwrap();
    assert!(result.is_ok(), "{:?}", result.errors);
    assert!(result.config.copy_files.is_empty());
    assert_eq!(result.config.chroot_mounts.len(), 1);
}

#[tokio::test]
async fn test_loader_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::new(dir.path().join("missing.json"))
        .load()
        .await
        .unwrap_err();
    assert!(matches!(err, amichroot_common::AmiChrootError::Io(_)));
}

#[test]
fn test_loader_with_tokio_test_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("build.json");
    std::fs::write(&path, r#"{"ami_name": "foo {{", "source_ami": ""}"#).unwrap();

    let result = tokio_test::block_on(ConfigLoader::new(&path).load_and_validate()).unwrap();
    assert_eq!(result.errors.len(), 2);
}

proptest! {
    #[test]
    fn validate_never_panics_on_arbitrary_strings(
        name in ".{0,40}",
        wrapper in ".{0,40}",
        source in ".{0,10}",
    ) {
        let config = RawOptions::new()
            .with("ami_name", name)
            .with("command_wrapper", wrapper)
            .with("source_ami", source);
        let _ = ConfigValidator::validate(&config);
    }

    #[test]
    fn valid_names_produce_no_errors(name in "[a-zA-Z0-9_.-]{3,64}") {
        let result = ConfigValidator::validate(&test_config().with("ami_name", name));
        prop_assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn copy_files_round_trip_unchanged(files in proptest::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,3}", 0..6)) {
        let result = ConfigValidator::validate(&test_config().with("copy_files", files.clone()));
        prop_assert!(result.is_ok());
        prop_assert_eq!(result.config.copy_files, files);
    }
}
