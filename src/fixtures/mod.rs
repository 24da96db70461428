//! Fixture manifests and isolated fixture copies

mod manifest;
mod resolver;

pub use manifest::{load_manifest, FixtureSource, LoadedManifest, ManifestEntry, MergedManifest};
pub use resolver::{FixtureDirs, FixtureResolver};
