//! Spec file format
//!
//! Defines the data structures for deserializing YAML spec files.

use serde::Deserialize;
use std::path::Path;

use crate::common::{Error, Result};

/// A spec file: a named group of test cases for one feature area
#[derive(Deserialize, Debug)]
pub struct SpecFile {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Test cases, run in order
    pub cases: Vec<TestCase>,
}

impl SpecFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ScenarioParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&content).map_err(|e| Error::ScenarioParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}

/// A single test case
#[derive(Deserialize, Debug)]
pub struct TestCase {
    pub name: String,
    pub steps: Vec<Step>,
}

/// A single step in a test case
///
/// String fields accept `${name}` placeholders for values bound by earlier
/// steps with `as`.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Empty collections in the application's database
    CleanDb { collections: Vec<String> },
    /// Resolve a fixture to a private copy and bind its path
    Fixture {
        key: String,
        #[serde(rename = "as")]
        bind: String,
    },
    /// Extract a zip archive into the fixture workspace
    Unzip {
        path: String,
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    /// Call the application's HTTP API
    Request {
        #[serde(default = "default_method")]
        method: String,
        path: String,
        /// Inline request body
        body: Option<String>,
        /// File whose contents become the request body
        body_file: Option<String>,
        content_type: Option<String>,
        expect: Option<ResponseExpectation>,
        /// Bind the response body
        #[serde(rename = "as")]
        bind: Option<String>,
    },
    /// Run a shell command
    Shell {
        command: String,
        #[serde(default = "default_expect_success")]
        expect_success: bool,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expect_success() -> bool {
    true
}

/// Expectations for an HTTP response
///
/// Without `status`, any 2xx status passes.
#[derive(Deserialize, Debug, Default)]
pub struct ResponseExpectation {
    pub status: Option<u16>,
    pub body_contains: Option<String>,
}
