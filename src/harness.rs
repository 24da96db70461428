//! Shared per-process test context
//!
//! A [`Harness`] bundles the fixture resolver and the application handle that
//! every spec in a runner process uses. Build one explicitly when runs must be
//! independent; [`Harness::global`] hands out a single process-wide instance.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::app::{AppHandle, ExternalApp, ReadyTimeouts};
use crate::common::config::{DbConfig, Settings};
use crate::common::{paths, Result};
use crate::fixtures::FixtureResolver;

static GLOBAL: OnceLock<Harness> = OnceLock::new();

pub struct Harness {
    root: PathBuf,
    pub fixtures: FixtureResolver,
    pub app: AppHandle<ExternalApp>,
}

impl Harness {
    /// Build a harness for a project root
    ///
    /// Nothing is booted or copied yet; both happen on first use.
    pub fn new(root: &Path, settings: &Settings) -> Result<Self> {
        let database_uri = match &settings.app.database_uri {
            Some(uri) => Some(uri.clone()),
            None => DbConfig::connection_uri(&paths::db_config_path(root, &paths::runtime_env()))?,
        };

        let app_settings = settings.app.clone();
        let app = AppHandle::new(
            move || {
                let settings = app_settings.clone();
                let uri = database_uri.clone();
                async move { ExternalApp::boot(&settings, uri.as_deref()).await }
            },
            ReadyTimeouts::from(&settings.app),
        );

        Ok(Self {
            root: root.to_path_buf(),
            fixtures: FixtureResolver::from_env(root),
            app,
        })
    }

    /// The process-wide harness, created on first call
    ///
    /// Later calls return the first instance regardless of their arguments.
    pub fn global(root: &Path, settings: &Settings) -> Result<&'static Harness> {
        if let Some(harness) = GLOBAL.get() {
            return Ok(harness);
        }
        let harness = Self::new(root, settings)?;
        Ok(GLOBAL.get_or_init(|| harness))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove fixture copies and stop the application
    pub async fn teardown(&self) -> Result<()> {
        self.fixtures.cleanup()?;
        self.app.shutdown().await
    }
}
