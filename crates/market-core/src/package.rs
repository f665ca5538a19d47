//! Package metadata, installed records and the package-local manifest.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Filename of the optional manifest at the root of an extracted package.
pub const PACKAGE_MANIFEST_FILENAME: &str = "manifest.json";

/// Registry metadata for one package version.
///
/// Fetched fresh for every resolution or install and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Unique package identifier.
    pub id: String,
    /// `MAJOR.MINOR.PATCH[+meta]`.
    pub version: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dependency id to version range.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Location of the tar.gz or zip archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// SHA-256 hex digest of the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Host tools this package declares support for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Package {
    /// Create a package with no dependencies and no archive.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: None,
            description: None,
            dependencies: BTreeMap::new(),
            download_url: None,
            checksum: None,
            supported_tools: None,
            changelog: None,
            updated_at: None,
        }
    }

    /// Declare a dependency on `id` within `range`.
    pub fn with_dependency(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.insert(id.into(), range.into());
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_supported_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the package can run under `tool`.
    ///
    /// Packages that declare no tool list are treated as universal.
    pub fn supports_tool(&self, tool: &str) -> bool {
        self.supported_tools
            .as_ref()
            .is_none_or(|tools| tools.iter().any(|t| t.eq_ignore_ascii_case(tool)))
    }

    /// Whether this package lists `id` as a dependency.
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.contains_key(id)
    }

    /// `id@version`, for messages.
    pub fn spec(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}

/// Where an installed package came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallSource {
    #[default]
    Marketplace,
    Local,
}

/// One record of the persisted installed-packages manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackage {
    pub package: Package,
    /// Absolute install directory.
    pub path: PathBuf,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub source: InstallSource,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl InstalledPackage {
    /// A freshly installed, enabled marketplace package.
    pub fn new(package: Package, path: impl Into<PathBuf>) -> Self {
        Self {
            package,
            path: path.into(),
            installed_at: Utc::now(),
            source: InstallSource::Marketplace,
            enabled: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.package.id
    }

    pub fn version(&self) -> &str {
        &self.package.version
    }
}

/// Optional manifest shipped inside a package archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Script to run after extraction, relative to the package root.
    #[serde(default)]
    pub post_install: Option<String>,
}

impl PackageManifest {
    /// Read [`PACKAGE_MANIFEST_FILENAME`] from an extracted package directory.
    ///
    /// Returns `Ok(None)` when the package ships no manifest.
    pub fn load(package_dir: &Path) -> Result<Option<Self>> {
        let path = package_dir.join(PACKAGE_MANIFEST_FILENAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(market_fs::Error::io(path, e).into()),
        }
    }
}
