//! Removal, update and inspection of installed packages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::installer::{InstallOptions, InstallOutcome, PackageInstaller, config_stash};
use crate::package::InstalledPackage;
use crate::resolver::{DependencyResolver, DependencyTree};

/// Options for [`PackageInstaller::uninstall_package`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UninstallOptions {
    /// Remove even if other installed packages depend on it.
    pub force: bool,
    /// Park the package's `config/` directory for the next install.
    pub keep_config: bool,
}

/// A newer registry version of an installed package.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub id: String,
    pub current_version: String,
    pub latest_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PackageInstaller {
    /// Remove an installed package and its manifest record.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInstalled`] when `id` is not in the manifest
    /// - [`Error::HasDependents`] when other installed packages depend on
    ///   `id` and `force` is off; nothing is removed in that case
    pub async fn uninstall_package(&self, id: &str, options: UninstallOptions) -> Result<InstalledPackage> {
        let mut manifest = self.store.read()?;
        let record = manifest
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotInstalled { id: id.to_string() })?;

        let dependents = manifest.dependents_of(id);
        if !dependents.is_empty() {
            if !options.force {
                return Err(Error::HasDependents {
                    id: id.to_string(),
                    dependents,
                });
            }
            tracing::warn!(id, dependents = %dependents.join(", "), "removing package that others depend on");
        }

        if options.keep_config {
            self.stash_config(&record).await?;
        }

        match tokio::fs::remove_dir_all(&record.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(id, path = %record.path.display(), "install directory already gone");
            }
            Err(e) => return Err(market_fs::Error::io(&record.path, e).into()),
        }

        manifest.remove(id);
        self.store.write(&manifest)?;
        tracing::info!(package = %record.package.spec(), "uninstalled");
        Ok(record)
    }

    async fn stash_config(&self, record: &InstalledPackage) -> Result<()> {
        let config_dir = record.path.join("config");
        if !config_dir.is_dir() {
            return Ok(());
        }
        let target_dir = record.path.parent().unwrap_or(&self.packages_dir);
        let stash = config_stash(target_dir, record.id());

        if stash.exists() {
            tokio::fs::remove_dir_all(&stash)
                .await
                .map_err(|e| market_fs::Error::io(&stash, e))?;
        }
        tokio::fs::rename(&config_dir, &stash)
            .await
            .map_err(|e| market_fs::Error::io(&config_dir, e))?;
        tracing::debug!(id = %record.id(), stash = %stash.display(), "configuration preserved");
        Ok(())
    }

    /// Reinstall `id` from the registry, keeping its `config/` directory.
    ///
    /// The package is removed first, then installed fresh into the same
    /// target directory. Removal follows the normal uninstall rules, so a
    /// package other installed packages depend on is refused with
    /// [`Error::HasDependents`] and nothing is installed.
    pub async fn update_package(&self, id: &str) -> Result<InstallOutcome> {
        let removed = self
            .uninstall_package(
                id,
                UninstallOptions {
                    force: false,
                    keep_config: true,
                },
            )
            .await?;

        let options = InstallOptions {
            force: true,
            target_dir: removed.path.parent().map(Into::into),
            ..InstallOptions::default()
        };
        self.install_package(id, &options).await
    }

    /// Installed packages whose registry version differs from the installed one.
    ///
    /// Versions are compared as strings. Packages the registry no longer
    /// knows, or cannot be asked about, are skipped.
    pub async fn check_for_updates(&self) -> Result<Vec<UpdateInfo>> {
        let manifest = self.store.read()?;
        let mut updates = Vec::new();

        for record in manifest.iter() {
            let latest = match self.registry.fetch_package(record.id()).await {
                Ok(Some(latest)) => latest,
                Ok(None) => {
                    tracing::warn!(id = %record.id(), "installed package missing from registry");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(id = %record.id(), error = %e, "update check failed");
                    continue;
                }
            };

            if latest.version != record.version() {
                updates.push(UpdateInfo {
                    id: record.id().to_string(),
                    current_version: record.version().to_string(),
                    latest_version: latest.version,
                    changelog: latest.changelog,
                    updated_at: latest.updated_at,
                });
            }
        }
        Ok(updates)
    }

    /// All installed packages, sorted by id.
    pub fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        let mut packages: Vec<_> = self.store.read()?.into_iter().collect();
        packages.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(packages)
    }

    pub fn installed(&self, id: &str) -> Result<Option<InstalledPackage>> {
        Ok(self.store.read()?.get(id).cloned())
    }

    /// Persist the `enabled` flag of an installed package.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<InstalledPackage> {
        let mut manifest = self.store.read()?;
        let record = manifest
            .get_mut(id)
            .ok_or_else(|| Error::NotInstalled { id: id.to_string() })?;
        record.enabled = enabled;
        let updated = record.clone();
        self.store.write(&manifest)?;
        Ok(updated)
    }

    /// Fetch `id` and resolve its dependency tree without installing.
    pub async fn resolve(&self, id: &str) -> Result<DependencyTree> {
        let package = self
            .registry
            .fetch_package(id)
            .await?
            .ok_or_else(|| Error::PackageNotFound { id: id.to_string() })?;
        DependencyResolver::new(self.registry.as_ref())
            .resolve(&package)
            .await
    }
}
