//! Project settings (`specrun.toml`)

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::SETTINGS_FILE;
use super::{Error, Result};

/// Main settings structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Settings {
    /// Where suites live and how they are named
    #[serde(default)]
    pub suites: SuiteConfig,

    /// Fixed subsets selectable from the command line
    #[serde(default)]
    pub subsets: Subsets,

    /// The process that executes the selected suites
    #[serde(default)]
    pub runner: RunnerConfig,

    /// The application under test
    #[serde(default)]
    pub app: AppSettings,
}

/// Suite discovery settings
#[derive(Debug, Deserialize, Clone)]
pub struct SuiteConfig {
    /// Test directory, relative to the project root
    #[serde(default = "default_suite_dir")]
    pub dir: PathBuf,

    /// File name suffix identifying a suite
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            dir: default_suite_dir(),
            suffix: default_suffix(),
        }
    }
}

fn default_suite_dir() -> PathBuf {
    PathBuf::from("tests")
}

fn default_suffix() -> String {
    ".spec.yaml".to_string()
}

/// Suite names bound to the `--smoke` and `--import-only` flags
#[derive(Debug, Deserialize, Clone)]
pub struct Subsets {
    #[serde(default = "default_smoke")]
    pub smoke: Vec<String>,

    #[serde(default = "default_import")]
    pub import: Vec<String>,
}

impl Default for Subsets {
    fn default() -> Self {
        Self {
            smoke: default_smoke(),
            import: default_import(),
        }
    }
}

fn default_smoke() -> Vec<String> {
    vec!["smoke".to_string()]
}

fn default_import() -> Vec<String> {
    vec!["import".to_string()]
}

/// How selected suites are handed to the runner
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    /// Every suite path is appended as an argument
    #[default]
    Paths,
    /// Suite paths are written to a temporary list file whose path is passed
    Aggregate,
}

/// Runner settings
///
/// Without a `program`, the built-in scenario runner (`specrun exec`) is used.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RunnerConfig {
    /// External runner executable
    pub program: Option<String>,

    /// Arguments placed before the suite entries
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub entry_mode: EntryMode,
}

/// Settings for the application under test
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    /// Command that boots the application; omit when it is already running
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Base URL the application serves on
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path polled until it answers with a success status
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Database the application stores its documents in. Falls back to
    /// `conf/<env>.config.toml` when unset.
    pub database_uri: Option<String>,

    #[serde(default = "default_boot_timeout")]
    pub boot_timeout_secs: u64,

    #[serde(default = "default_module_timeout")]
    pub module_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            base_url: default_base_url(),
            health_path: default_health_path(),
            database_uri: None,
            boot_timeout_secs: default_boot_timeout(),
            module_timeout_secs: default_module_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_health_path() -> String {
    "/api/health".to_string()
}

fn default_boot_timeout() -> u64 {
    120
}

fn default_module_timeout() -> u64 {
    30
}

impl AppSettings {
    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }
}

impl Settings {
    /// Load settings from `<root>/specrun.toml`
    ///
    /// Returns default settings if the file doesn't exist
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content).map_err(|e| Error::config_parse(&path, e))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Database section of `conf/<env>.config.toml`
#[derive(Debug, Deserialize, Default)]
pub struct DbConfig {
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct DatabaseSection {
    pub connection_uri: Option<String>,
}

impl DbConfig {
    /// Read the connection URI from an environment config file
    ///
    /// `Ok(None)` when the file or the URI is absent.
    pub fn connection_uri(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let config: DbConfig =
            toml::from_str(&content).map_err(|e| Error::config_parse(path, e))?;
        Ok(config
            .database
            .connection_uri
            .filter(|uri| !uri.trim().is_empty()))
    }
}
