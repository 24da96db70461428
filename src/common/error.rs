//! Error types for specrun
//!
//! Fatal errors are printed as-is before the process exits, so messages are
//! written to be actionable: they name the path, key or setting involved and
//! say how to fix it.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for specrun
#[derive(Error, Debug)]
pub enum Error {
    // === Fixture Errors ===
    #[error(
        "No fixture manifest found.\n\
         Searched:\n{searched}\n\
         To fix this, either:\n  \
         1. Create tests/fixtures/manifest.json mapping fixture keys to file names, or\n  \
         2. Point SPECRUN_FIXTURES_DIR at a directory containing manifest.json, or\n  \
         3. Set SPECRUN_CUSTOM_DIR to a directory with a fixtures/manifest.json"
    )]
    ConfigurationMissing { searched: String },

    #[error("Invalid fixture manifest '{path}': {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Unknown fixture '{key}'. Valid keys: {available}")]
    FixtureKeyNotFound { key: String, available: String },

    #[error("Fixture '{key}' points at '{}', which does not exist", path.display())]
    FixtureFileMissing { key: String, path: PathBuf },

    // === Suite Errors ===
    #[error(
        "Test suite '{name}' not found.\n\
         Expected file: {}\n\
         Run 'specrun list' to see the available suites.",
        path.display()
    )]
    SuiteNotFound { name: String, path: PathBuf },

    // === Application Errors ===
    #[error("Application module '{0}' is not available")]
    ModuleNotFound(String),

    #[error("Timed out after {secs} seconds waiting for {what} to become ready")]
    ReadyTimeout { what: String, secs: u64 },

    #[error("Application process exited before becoming ready (exit code {0:?})")]
    AppExited(Option<i32>),

    #[error("Application readiness check failed: {0}")]
    NotReady(String),

    // === Runner Errors ===
    #[error("Test runner '{0}' not found in PATH")]
    RunnerNotFound(String),

    #[error("Failed to parse spec file '{path}': {reason}")]
    ScenarioParse { path: PathBuf, reason: String },

    #[error("Step failed: {0}")]
    StepFailed(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file '{path}': {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    // === Backend Errors ===
    #[error("Storage error: {0}")]
    Storage(#[from] crate::app::StorageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a fixture key error listing every valid key
    pub fn fixture_key_not_found<S: AsRef<str>>(key: &str, keys: &[S]) -> Self {
        Self::FixtureKeyNotFound {
            key: key.to_string(),
            available: keys.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a readiness timeout error
    pub fn ready_timeout(what: &str, secs: u64) -> Self {
        Self::ReadyTimeout {
            what: what.to_string(),
            secs,
        }
    }

    /// Create a config parse error for a file
    pub fn config_parse(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::ConfigParse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_lists_keys() {
        let err = Error::fixture_key_not_found("missing", &["a", "b", "course-export"]);
        let msg = err.to_string();
        assert!(msg.contains("'missing'"));
        assert!(msg.contains("a, b, course-export"));
    }

    #[test]
    fn test_configuration_missing_is_actionable() {
        let err = Error::ConfigurationMissing {
            searched: "  /nowhere/manifest.json".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nowhere/manifest.json"));
        assert!(msg.contains("SPECRUN_FIXTURES_DIR"));
        assert!(msg.contains("SPECRUN_CUSTOM_DIR"));
        assert!(msg.lines().count() > 3);
    }

    #[test]
    fn test_suite_not_found_names_path() {
        let err = Error::SuiteNotFound {
            name: "auth".to_string(),
            path: PathBuf::from("/proj/tests/auth.spec.yaml"),
        };
        assert!(err.to_string().contains("/proj/tests/auth.spec.yaml"));
    }
}
