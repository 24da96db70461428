//! Environment variables and conventional project paths
//!
//! A project root looks like:
//!
//! ```text
//! <root>/specrun.toml            optional settings
//! <root>/tests/*.spec.yaml       primary suites
//! <root>/tests/fixtures/         primary fixtures + manifest.json
//! <root>/conf/<env>.config.toml  database connection for the pre-run drop
//! ```
//!
//! A custom directory (`SPECRUN_CUSTOM_DIR`) layers its own `tests/` and
//! `fixtures/` on top of the primary ones.

use std::path::{Path, PathBuf};

/// Root of an override tree containing `fixtures/` and `tests/`
pub const ENV_CUSTOM_DIR: &str = "SPECRUN_CUSTOM_DIR";

/// Replaces the primary fixtures directory
pub const ENV_FIXTURES_DIR: &str = "SPECRUN_FIXTURES_DIR";

/// Points directly at an override fixtures directory
pub const ENV_OVERRIDE_FIXTURES_DIR: &str = "SPECRUN_OVERRIDE_FIXTURES_DIR";

/// Runtime environment name used to pick `conf/<env>.config.toml`
pub const ENV_RUNTIME: &str = "SPECRUN_ENV";

/// Environment name used when `SPECRUN_ENV` is unset
pub const DEFAULT_RUNTIME_ENV: &str = "testing";

/// Manifest file name inside a fixtures directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Project settings file name
pub const SETTINGS_FILE: &str = "specrun.toml";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// The custom override root, if configured
pub fn custom_dir() -> Option<PathBuf> {
    env_path(ENV_CUSTOM_DIR)
}

/// Primary fixtures directory: `SPECRUN_FIXTURES_DIR` or `<root>/tests/fixtures`
pub fn primary_fixtures_dir(root: &Path) -> PathBuf {
    env_path(ENV_FIXTURES_DIR).unwrap_or_else(|| root.join("tests").join("fixtures"))
}

/// Override fixtures directory
///
/// `SPECRUN_OVERRIDE_FIXTURES_DIR` wins over `<SPECRUN_CUSTOM_DIR>/fixtures`.
pub fn override_fixtures_dir() -> Option<PathBuf> {
    env_path(ENV_OVERRIDE_FIXTURES_DIR).or_else(|| custom_dir().map(|d| d.join("fixtures")))
}

/// Selected runtime environment name
pub fn runtime_env() -> String {
    std::env::var(ENV_RUNTIME)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_RUNTIME_ENV.to_string())
}

/// Path of the environment-specific database configuration
pub fn db_config_path(root: &Path, env: &str) -> PathBuf {
    root.join("conf").join(format!("{env}.config.toml"))
}

/// Path of the manifest inside a fixtures directory
pub fn manifest_path(fixtures_dir: &Path) -> PathBuf {
    fixtures_dir.join(MANIFEST_FILE)
}
