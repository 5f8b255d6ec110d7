//! Where map files and item descriptors come from.
//!
//! The map loader reads through an [`AssetSource`] from a worker thread, so
//! sources must be shareable across threads.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::AssetError;

/// Read-only store of text assets addressed by identifier.
pub trait AssetSource: Send + Sync {
    /// Fetch the full text of an asset.
    fn read(&self, id: &str) -> Result<String, AssetError>;
}

/// Assets stored as files below a root directory.
///
/// Identifiers are relative paths. Absolute paths and `..` components are
/// refused so an authored map cannot reach outside the asset root.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let relative = Path::new(id);
        let inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        inside.then(|| self.root.join(relative))
    }
}

impl AssetSource for DirSource {
    fn read(&self, id: &str) -> Result<String, AssetError> {
        let path = self
            .resolve(id)
            .ok_or_else(|| AssetError::NotFound(id.to_string()))?;
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(id.to_string()),
            _ => AssetError::Io { path, source },
        })
    }
}

/// Assets held in memory. Handy for tests and generated content.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.assets.insert(id.into(), text.into());
    }

    /// Builder-style [`MemorySource::insert`].
    pub fn with(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }
}

impl AssetSource for MemorySource {
    fn read(&self, id: &str) -> Result<String, AssetError> {
        self.assets
            .get(id)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(id.to_string()))
    }
}
