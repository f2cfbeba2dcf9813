//! Test utilities and shared test helpers for amichroot.
//!
//! This module provides common testing helpers that can be used across all
//! crates in the workspace for unit and integration testing.

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests with a sensible default configuration.
/// This function is safe to call multiple times and will only initialize once.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        // Another harness may have installed a subscriber already.
        let _ = fmt()
            .with_test_writer()
            .with_env_filter(filter)
            .try_init();
    });
}

/// Create a temporary directory for tests that automatically cleans up.
#[cfg(feature = "tempfile")]
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary directory")
}

/// Write `contents` to `name` inside `dir` and return the full path.
#[cfg(feature = "tempfile")]
pub fn write_temp_file(
    dir: &tempfile::TempDir,
    name: &str,
    contents: &str,
) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write temporary file");
    path
}

/// Assert that a list of diagnostics contains one whose text includes `needle`.
pub fn assert_contains_message<T: std::fmt::Display>(diagnostics: &[T], needle: &str) {
    assert!(
        diagnostics.iter().any(|d| d.to_string().contains(needle)),
        "expected a diagnostic containing {needle:?}, got: [{}]",
        diagnostics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    );
}

/// Property testing strategies shared across crates.
#[cfg(feature = "proptest")]
pub mod strategies {
    use proptest::prelude::*;

    /// Arbitrary text that never contains a template delimiter.
    pub fn brace_free_text() -> impl Strategy<Value = String> {
        "[^{}]{0,64}"
    }

    /// Arbitrary text biased toward template syntax characters.
    pub fn template_like_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                Just("{{".to_string()),
                Just("}}".to_string()),
                Just(".Command".to_string()),
                Just("\"".to_string()),
                Just(" end ".to_string()),
                Just(" if ".to_string()),
                "[a-z ./-]{0,8}",
            ],
            0..12,
        )
        .prop_map(|parts| parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_assert_contains_message() {
        let messages = vec!["first problem".to_string(), "second problem".to_string()];
        assert_contains_message(&messages, "second");
    }

    #[test]
    #[should_panic(expected = "expected a diagnostic containing")]
    fn test_assert_contains_message_panics_when_missing() {
        let messages = vec!["only problem".to_string()];
        assert_contains_message(&messages, "missing");
    }
}
