//! Persisted record of installed packages.
//!
//! The manifest is loaded, mutated in memory and written back whole on
//! every change. Nothing is cached between calls. Two installers sharing a
//! manifest file must be serialized externally; the file lock only keeps
//! individual reads and writes from tearing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::InstalledPackage;

/// All installed packages, at most one record per id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledManifest {
    packages: Vec<InstalledPackage>,
}

impl InstalledManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&InstalledPackage> {
        self.packages.iter().find(|p| p.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut InstalledPackage> {
        self.packages.iter_mut().find(|p| p.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the record with the same id in place, or append.
    pub fn upsert(&mut self, record: InstalledPackage) {
        match self.get_mut(record.id()) {
            Some(existing) => *existing = record,
            None => self.packages.push(record),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<InstalledPackage> {
        let index = self.packages.iter().position(|p| p.id() == id)?;
        Some(self.packages.remove(index))
    }

    /// Ids of other installed packages that declare a dependency on `id`.
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.packages
            .iter()
            .filter(|p| p.id() != id && p.package.depends_on(id))
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Records in install order.
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPackage> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl IntoIterator for InstalledManifest {
    type Item = InstalledPackage;
    type IntoIter = std::vec::IntoIter<InstalledPackage>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.into_iter()
    }
}

/// Load and persist the [`InstalledManifest`].
pub trait ManifestStore: Send + Sync {
    /// A missing store reads as empty.
    fn read(&self) -> Result<InstalledManifest>;

    fn write(&self, manifest: &InstalledManifest) -> Result<()>;
}

/// [`ManifestStore`] backed by a JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonManifestStore {
    path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestStore for JsonManifestStore {
    fn read(&self) -> Result<InstalledManifest> {
        match market_fs::io::read_locked(&self.path)? {
            Some(content) if !content.trim().is_empty() => Ok(serde_json::from_str(&content)?),
            _ => Ok(InstalledManifest::default()),
        }
    }

    fn write(&self, manifest: &InstalledManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)?;
        market_fs::io::write_text(&self.path, &content)?;
        tracing::debug!(path = %self.path.display(), count = manifest.len(), "manifest saved");
        Ok(())
    }
}
