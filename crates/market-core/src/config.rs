//! Marketplace configuration
//!
//! Loaded from `~/.market/config.toml` (or an explicit path) through
//! [`market_fs::ConfigStore`]. Every field has a default, so a missing or
//! partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::download::DownloadPolicy;
use crate::error::Result;

/// Default registry endpoint.
pub const DEFAULT_REGISTRY_URL: &str = "https://marketplace.example.com/api";

/// `~/.market`, or `./.market` when no home directory is known.
pub fn market_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".market")
}

/// Location of the user config file.
pub fn default_config_path() -> PathBuf {
    market_home().join("config.toml")
}

/// Top-level `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Base URL of the package registry
    pub registry_url: String,
    /// Directory holding one subdirectory per installed package
    pub packages_dir: PathBuf,
    /// Installed-packages manifest
    pub manifest_path: PathBuf,
    /// Host tool id checked against `supportedTools`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_tool: Option<String>,
    pub download: DownloadConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let home = market_home();
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            packages_dir: home.join("packages"),
            manifest_path: home.join("installed.json"),
            code_tool: None,
            download: DownloadConfig::default(),
        }
    }
}

impl MarketConfig {
    /// Load from `path`, or from [`default_config_path`] when `None`.
    ///
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        let config = market_fs::ConfigStore::new().load_or_default(&path)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Persist to `path` in the format implied by its extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        market_fs::ConfigStore::new().save(path, self)?;
        Ok(())
    }
}

/// `[download]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub retry_delay_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            retry_delay_secs: 2,
        }
    }
}

impl DownloadConfig {
    pub fn policy(&self) -> DownloadPolicy {
        DownloadPolicy {
            max_attempts: self.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            retry_step: Duration::from_secs(self.retry_delay_secs),
        }
    }
}
