//! Fixture manifests
//!
//! A manifest is a JSON object next to the fixture files, mapping logical
//! fixture keys to file names relative to the manifest's directory:
//!
//! ```json
//! { "course-export": "export.zip", "theme": "themes/basic.zip" }
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::paths::manifest_path;
use crate::common::{Error, Result};

/// Which side of the merge an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureSource {
    Primary,
    Override,
}

impl std::fmt::Display for FixtureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureSource::Primary => write!(f, "primary"),
            FixtureSource::Override => write!(f, "override"),
        }
    }
}

/// A manifest read from disk, together with the directory it lives in
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub dir: PathBuf,
    pub entries: BTreeMap<String, String>,
}

/// Load `<dir>/manifest.json`
///
/// A missing file is not an error: it yields `Ok(None)`. A file that exists
/// but is not a JSON object of strings is rejected.
pub fn load_manifest(dir: &Path) -> Result<Option<LoadedManifest>> {
    let path = manifest_path(dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let entries: BTreeMap<String, String> =
        serde_json::from_str(&content).map_err(|e| Error::ManifestInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    tracing::debug!(path = %path.display(), entries = entries.len(), "loaded fixture manifest");

    Ok(Some(LoadedManifest {
        dir: dir.to_path_buf(),
        entries,
    }))
}

/// A single resolved manifest entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// File name relative to `dir`
    pub file: String,
    /// Directory the entry was sourced from
    pub dir: PathBuf,
    pub source: FixtureSource,
}

impl ManifestEntry {
    /// Absolute path of the canonical fixture file
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

/// Primary and override manifests combined; override entries win
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl MergedManifest {
    pub fn merge(primary: Option<LoadedManifest>, overlay: Option<LoadedManifest>) -> Self {
        let mut entries = BTreeMap::new();

        let sides = [
            (primary, FixtureSource::Primary),
            (overlay, FixtureSource::Override),
        ];
        for (manifest, source) in sides {
            let Some(manifest) = manifest else { continue };
            for (key, file) in manifest.entries {
                entries.insert(
                    key,
                    ManifestEntry {
                        file,
                        dir: manifest.dir.clone(),
                        source,
                    },
                );
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
