//! Resolves fixture keys to private copies of the fixture files
//!
//! Consumers are free to unzip, rewrite or delete the path they get back:
//! every call copies the canonical file into the resolver's temp workspace
//! under a fresh name, so the checked-in fixture is never touched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;

use super::manifest::{load_manifest, MergedManifest};
use crate::common::paths::{self, manifest_path};
use crate::common::{Error, Result};

/// Directories fixtures are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDirs {
    pub primary: PathBuf,
    pub overlay: Option<PathBuf>,
}

impl FixtureDirs {
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            overlay: None,
        }
    }

    pub fn with_override(mut self, dir: impl Into<PathBuf>) -> Self {
        self.overlay = Some(dir.into());
        self
    }

    /// Resolve directories from the environment, relative to a project root
    pub fn from_env(root: &Path) -> Self {
        Self {
            primary: paths::primary_fixtures_dir(root),
            overlay: paths::override_fixtures_dir(),
        }
    }
}

/// Manifest cache plus temp workspace for one test process
///
/// Lifecycle: the merged manifest is built on first use and kept until
/// [`reset_manifest`](Self::reset_manifest); the workspace is created on the
/// first [`fixture`](Self::fixture) call and removed by
/// [`cleanup`](Self::cleanup) (or when the resolver is dropped).
pub struct FixtureResolver {
    dirs: Mutex<FixtureDirs>,
    manifest: Mutex<Option<Arc<MergedManifest>>>,
    workspace: Mutex<Option<TempDir>>,
    next_token: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FixtureResolver {
    pub fn new(dirs: FixtureDirs) -> Self {
        Self {
            dirs: Mutex::new(dirs),
            manifest: Mutex::new(None),
            workspace: Mutex::new(None),
            next_token: AtomicU64::new(0),
        }
    }

    pub fn from_env(root: &Path) -> Self {
        Self::new(FixtureDirs::from_env(root))
    }

    pub fn dirs(&self) -> FixtureDirs {
        lock(&self.dirs).clone()
    }

    /// Register (or clear) the override fixtures directory
    ///
    /// Drops the cached manifest so the next lookup sees the new layering.
    pub fn set_override_dir(&self, dir: Option<PathBuf>) {
        lock(&self.dirs).overlay = dir;
        self.reset_manifest();
    }

    /// The merged manifest, loading it on first use
    pub fn manifest(&self) -> Result<Arc<MergedManifest>> {
        let mut cached = lock(&self.manifest);
        if let Some(manifest) = cached.as_ref() {
            return Ok(Arc::clone(manifest));
        }

        let dirs = self.dirs();
        let primary = load_manifest(&dirs.primary)?;
        let overlay = match &dirs.overlay {
            Some(dir) => load_manifest(dir)?,
            None => None,
        };

        if primary.is_none() && overlay.is_none() {
            let mut searched = vec![manifest_path(&dirs.primary)];
            searched.extend(dirs.overlay.as_deref().map(manifest_path));
            return Err(Error::ConfigurationMissing {
                searched: searched
                    .iter()
                    .map(|p| format!("  {}", p.display()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            });
        }

        let merged = Arc::new(MergedManifest::merge(primary, overlay));
        tracing::debug!(entries = merged.len(), "built merged fixture manifest");
        *cached = Some(Arc::clone(&merged));
        Ok(merged)
    }

    /// Forget the cached manifest; the next lookup re-reads from disk
    pub fn reset_manifest(&self) {
        *lock(&self.manifest) = None;
    }

    /// Copy the fixture behind `key` into the workspace and return the copy
    pub fn fixture(&self, key: &str) -> Result<PathBuf> {
        let manifest = self.manifest()?;
        let entry = manifest
            .get(key)
            .ok_or_else(|| Error::fixture_key_not_found(key, &manifest.keys().collect::<Vec<_>>()))?;

        let source = entry.path();
        if !source.is_file() {
            return Err(Error::FixtureFileMissing {
                key: key.to_string(),
                path: source,
            });
        }

        let dest = self.workspace()?.join(self.copy_name(key, &entry.file));
        std::fs::copy(&source, &dest)?;

        tracing::debug!(
            key,
            source = %source.display(),
            dest = %dest.display(),
            "resolved fixture"
        );
        Ok(dest)
    }

    /// The temp workspace, created on first use
    pub fn workspace(&self) -> Result<PathBuf> {
        let mut workspace = lock(&self.workspace);
        if let Some(dir) = workspace.as_ref() {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new()
            .prefix("specrun-fixtures-")
            .tempdir()?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "created fixture workspace");
        *workspace = Some(dir);
        Ok(path)
    }

    /// Remove the temp workspace; a no-op when none exists
    pub fn cleanup(&self) -> Result<()> {
        if let Some(dir) = lock(&self.workspace).take() {
            tracing::debug!(path = %dir.path().display(), "removing fixture workspace");
            dir.close()?;
        }
        Ok(())
    }

    fn copy_name(&self, key: &str, file: &str) -> String {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let file_name = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fixture".to_string());
        format!("{key}-{token}-{file_name}")
    }
}
