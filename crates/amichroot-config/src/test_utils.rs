//! Option bag fixtures for tests in this and dependent crates.

use crate::value::{OptionValue, RawOptions};
use std::collections::BTreeMap;

/// A minimal option bag that validates with no errors and no warnings.
pub fn base_options() -> RawOptions {
    RawOptions::new()
        .with("ami_name", "foo")
        .with("source_ami", "foo")
        .with("region", "us-east-1")
        .with("skip_region_validation", true)
}

/// A single block device mapping record with no fields set.
pub fn empty_mapping() -> OptionValue {
    OptionValue::Map(BTreeMap::new())
}

/// Base options as a YAML document.
pub const BASE_OPTIONS_YAML: &str = "\
ami_name: foo
source_ami: foo
region: us-east-1
skip_region_validation: true
";
