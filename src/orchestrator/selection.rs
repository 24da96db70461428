//! Test selection
//!
//! Turns command-line choices into the ordered list of spec files handed to
//! the runner. Every path in a [`TestSelection`] exists on disk.

use std::path::{Path, PathBuf};

use crate::common::config::Settings;
use crate::common::paths::{self, manifest_path};
use crate::common::{Error, Result};

/// What the user asked to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Suites named on the command line
    Named(Vec<String>),
    /// One of the configured subsets
    Subset(Subset),
    /// Every suite in the test directory
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Smoke,
    Import,
}

impl Subset {
    fn suites<'a>(&self, settings: &'a Settings) -> &'a [String] {
        match self {
            Subset::Smoke => &settings.subsets.smoke,
            Subset::Import => &settings.subsets.import,
        }
    }
}

/// Where suites and override fixtures are looked up
#[derive(Debug, Clone)]
pub struct Layout {
    pub tests_dir: PathBuf,
    pub suffix: String,
    /// Root of the custom override tree (`tests/`, `fixtures/`)
    pub custom_dir: Option<PathBuf>,
    /// Explicit override fixtures directory
    pub override_fixtures: Option<PathBuf>,
}

impl Layout {
    /// Layout for a project root, honoring the override environment variables
    pub fn new(root: &Path, settings: &Settings) -> Self {
        Self {
            tests_dir: root.join(&settings.suites.dir),
            suffix: settings.suites.suffix.clone(),
            custom_dir: paths::custom_dir(),
            override_fixtures: paths::override_fixtures_dir(),
        }
    }

    fn suite_path(&self, name: &str) -> PathBuf {
        self.tests_dir.join(format!("{name}{}", self.suffix))
    }
}

/// Resolved spec files plus the override fixtures to register for the run
#[derive(Debug, Clone, Default)]
pub struct TestSelection {
    pub files: Vec<PathBuf>,
    pub override_fixtures: Option<PathBuf>,
}

impl TestSelection {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Spec files directly inside `dir`, sorted by name
///
/// A directory that does not exist has no suites.
pub fn discover(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix) && n.len() > suffix.len());
        if matches && entry.file_type()?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn named(layout: &Layout, names: &[String]) -> Result<Vec<PathBuf>> {
    names
        .iter()
        .map(|name| {
            let path = layout.suite_path(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(Error::SuiteNotFound {
                    name: name.clone(),
                    path,
                })
            }
        })
        .collect()
}

/// Resolve a selection against the project layout
///
/// Fails with [`Error::SuiteNotFound`] before returning anything if a named
/// or subset suite is missing. Suites from the custom directory's `tests/`
/// follow the primary ones.
pub fn select(layout: &Layout, settings: &Settings, selection: &Selection) -> Result<TestSelection> {
    let mut files = match selection {
        Selection::Named(names) => named(layout, names)?,
        Selection::Subset(subset) => named(layout, subset.suites(settings))?,
        Selection::All => discover(&layout.tests_dir, &layout.suffix)?,
    };

    if let Some(custom) = &layout.custom_dir {
        let extra = discover(&custom.join("tests"), &layout.suffix)?;
        if !extra.is_empty() {
            tracing::info!(count = extra.len(), dir = %custom.display(), "Adding custom suites");
        }
        files.extend(extra);
    }

    let override_fixtures = layout
        .override_fixtures
        .clone()
        .filter(|dir| manifest_path(dir).is_file());
    if let Some(dir) = &override_fixtures {
        tracing::info!(dir = %dir.display(), "Using override fixtures");
    }

    Ok(TestSelection {
        files,
        override_fixtures,
    })
}
