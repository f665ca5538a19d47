//! Package installation.
//!
//! [`PackageInstaller::install_package`] runs the full pipeline for one
//! package: installed-state check, metadata fetch, compatibility check,
//! dependency installation, then download, checksum, extraction,
//! post-install script and manifest commit.
//!
//! Dependencies are resolved once for the root, flattened into install
//! order and installed one after another without further dependency
//! handling, so every package is installed once and a cycle cannot loop.
//! A dependency failure aborts the root; dependencies installed before the
//! failure stay installed.
//!
//! Any hard failure after download starts removes the downloaded archive
//! and, when this run created it, the install directory before the error
//! is returned. A preserved `config/` is moved back in only after the
//! manifest commit.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::archive::{ArchiveFormat, extract_archive};
use crate::config::MarketConfig;
use crate::download::{DownloadPolicy, HttpTransport, Transport, download};
use crate::error::{Error, Result};
use crate::graph::{detect_circular_dependencies, flatten_dependency_tree};
use crate::hooks::run_script;
use crate::package::{InstalledPackage, Package, PackageManifest};
use crate::registry::{HttpRegistry, PackageRegistry};
use crate::resolver::DependencyResolver;
use crate::store::{JsonManifestStore, ManifestStore};

/// Options for [`PackageInstaller::install_package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Reinstall even if the package is already installed.
    pub force: bool,
    pub install_dependencies: bool,
    /// Overrides the installer's packages directory.
    pub target_dir: Option<PathBuf>,
    pub skip_checksum: bool,
    /// Host tool to check `supportedTools` against.
    pub code_tool: Option<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force: false,
            install_dependencies: true,
            target_dir: None,
            skip_checksum: false,
            code_tool: None,
        }
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub package: Package,
    /// Install directory.
    pub path: PathBuf,
    /// Nothing was done because the package was already present.
    pub already_installed: bool,
    /// Non-fatal problems: compatibility, manifest, post-install script.
    pub warnings: Vec<String>,
    /// Outcomes of dependency installs, in install order.
    pub dependencies: Vec<InstallOutcome>,
    pub duration: Duration,
}

/// Installs, removes and updates packages against one manifest store.
#[derive(Clone)]
pub struct PackageInstaller {
    pub(crate) registry: Arc<dyn PackageRegistry>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn ManifestStore>,
    pub(crate) packages_dir: PathBuf,
    pub(crate) policy: DownloadPolicy,
}

impl std::fmt::Debug for PackageInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageInstaller")
            .field("packages_dir", &self.packages_dir)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Paths created by one install run, removed again on failure.
struct Staging {
    install_dir: PathBuf,
    archive: PathBuf,
    /// An existing install directory was cleared for a forced reinstall.
    replaced_existing: bool,
    /// The install directory belongs to this run and may be removed.
    owns_install_dir: bool,
}

impl PackageInstaller {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ManifestStore>,
        packages_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            transport,
            store,
            packages_dir: packages_dir.into(),
            policy: DownloadPolicy::default(),
        }
    }

    /// HTTP registry and transport, JSON manifest, paths from `config`.
    pub fn from_config(config: &MarketConfig) -> Self {
        Self::new(
            Arc::new(HttpRegistry::new(&config.registry_url)),
            Arc::new(HttpTransport::new()),
            Arc::new(JsonManifestStore::new(&config.manifest_path)),
            &config.packages_dir,
        )
        .with_download_policy(config.download.policy())
    }

    pub fn with_download_policy(mut self, policy: DownloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn registry(&self) -> &dyn PackageRegistry {
        self.registry.as_ref()
    }

    /// Install `id` and, unless disabled, its dependencies.
    ///
    /// Returns early with `already_installed` set when the package is in
    /// the manifest and `force` is off. That path does no network or disk
    /// I/O beyond reading the manifest.
    ///
    /// # Errors
    ///
    /// - [`Error::PackageNotFound`], [`Error::InvalidPackageId`] or
    ///   [`Error::MissingDownloadUrl`] before anything is written
    /// - resolution errors, and [`Error::Dependency`] when a dependency
    ///   install fails
    /// - [`Error::InstallFailed`] wrapping any failure after the install
    ///   directory was created, once it has been rolled back
    pub async fn install_package(&self, id: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let started = Instant::now();
        if let Some(outcome) = self.existing_install(id, options, started)? {
            return Ok(outcome);
        }

        let package = self.fetch_installable(id).await?;
        let mut warnings = compatibility_warnings(&package, options.code_tool.as_deref());

        let dependencies = if options.install_dependencies && !package.dependencies.is_empty() {
            self.install_dependencies(&package, options, &mut warnings).await?
        } else {
            Vec::new()
        };

        let mut outcome = self.install_fetched(package, options, warnings, started).await?;
        outcome.dependencies = dependencies;
        Ok(outcome)
    }

    /// Same pipeline as [`install_package`](Self::install_package) minus
    /// the dependency step.
    async fn install_single(&self, id: &str, options: &InstallOptions) -> Result<InstallOutcome> {
        let started = Instant::now();
        if let Some(outcome) = self.existing_install(id, options, started)? {
            return Ok(outcome);
        }
        let package = self.fetch_installable(id).await?;
        let warnings = compatibility_warnings(&package, options.code_tool.as_deref());
        self.install_fetched(package, options, warnings, started).await
    }

    fn existing_install(
        &self,
        id: &str,
        options: &InstallOptions,
        started: Instant,
    ) -> Result<Option<InstallOutcome>> {
        if options.force {
            return Ok(None);
        }
        let manifest = self.store.read()?;
        Ok(manifest.get(id).map(|record| {
            tracing::debug!(id, "already installed");
            InstallOutcome {
                package: record.package.clone(),
                path: record.path.clone(),
                already_installed: true,
                warnings: Vec::new(),
                dependencies: Vec::new(),
                duration: started.elapsed(),
            }
        }))
    }

    async fn fetch_installable(&self, id: &str) -> Result<Package> {
        let package = self
            .registry
            .fetch_package(id)
            .await?
            .ok_or_else(|| Error::PackageNotFound { id: id.to_string() })?;
        if !is_safe_id(&package.id) {
            return Err(Error::InvalidPackageId { id: package.id });
        }
        if package.download_url.is_none() {
            return Err(Error::MissingDownloadUrl { id: id.to_string() });
        }
        Ok(package)
    }

    async fn install_dependencies(
        &self,
        package: &Package,
        options: &InstallOptions,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<InstallOutcome>> {
        let tree = DependencyResolver::new(self.registry.as_ref())
            .resolve(package)
            .await?;

        if tree.has_circular {
            for cycle in detect_circular_dependencies(&tree) {
                let cycle = cycle.join(" -> ");
                tracing::warn!(id = %package.id, %cycle, "circular dependency");
                warnings.push(format!("circular dependency: {cycle}"));
            }
        }

        let dependency_options = InstallOptions {
            force: false,
            install_dependencies: false,
            ..options.clone()
        };

        let mut outcomes = Vec::new();
        for dependency in flatten_dependency_tree(&tree)
            .into_iter()
            .filter(|p| p.id != package.id)
        {
            tracing::debug!(id = %package.id, dependency = %dependency.id, "installing dependency");
            let outcome = self
                .install_single(&dependency.id, &dependency_options)
                .await
                .map_err(|e| Error::in_dependency(dependency.id.clone(), e))?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Steps from directory preparation to manifest commit, with rollback.
    async fn install_fetched(
        &self,
        package: Package,
        options: &InstallOptions,
        mut warnings: Vec<String>,
        started: Instant,
    ) -> Result<InstallOutcome> {
        let target_dir = options
            .target_dir
            .clone()
            .unwrap_or_else(|| self.packages_dir.clone());
        let target_dir = std::path::absolute(&target_dir)?;
        let url = package.download_url.clone().unwrap_or_default();

        let install_dir = target_dir.join(&package.id);
        let existed = install_dir.exists();
        let replaced_existing = options.force && existed;
        let staging = Staging {
            archive: target_dir.join(archive_file_name(&package, &url)),
            replaced_existing,
            owns_install_dir: replaced_existing || !existed,
            install_dir,
        };

        match self
            .install_payload(&package, &url, &staging, options, &mut warnings)
            .await
        {
            Ok(()) => {
                if let Some(warning) =
                    restore_config(&target_dir, &package.id, &staging.install_dir).await
                {
                    warnings.push(warning);
                }
                tracing::info!(package = %package.spec(), path = %staging.install_dir.display(), "installed");
                Ok(InstallOutcome {
                    path: staging.install_dir,
                    package,
                    already_installed: false,
                    warnings,
                    dependencies: Vec::new(),
                    duration: started.elapsed(),
                })
            }
            Err(e) => {
                tracing::warn!(package = %package.spec(), error = %e, "install failed, rolling back");
                self.rollback(&package.id, &staging).await;
                Err(Error::InstallFailed {
                    id: package.id,
                    elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn install_payload(
        &self,
        package: &Package,
        url: &str,
        staging: &Staging,
        options: &InstallOptions,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let install_dir = &staging.install_dir;
        if staging.replaced_existing {
            tokio::fs::remove_dir_all(install_dir)
                .await
                .map_err(|e| market_fs::Error::io(install_dir, e))?;
        }
        tokio::fs::create_dir_all(install_dir)
            .await
            .map_err(|e| market_fs::Error::io(install_dir, e))?;

        download(self.transport.as_ref(), url, &staging.archive, &self.policy).await?;

        if let Some(expected) = package.checksum.as_deref().filter(|_| !options.skip_checksum) {
            verify_checksum(&staging.archive, expected).await?;
        }

        let format = ArchiveFormat::detect(&staging.archive)?;
        extract_archive(&staging.archive, install_dir, format).await?;

        match PackageManifest::load(install_dir) {
            Ok(Some(manifest)) => {
                if let Some(script) = manifest.post_install {
                    if let Some(warning) = run_post_install(package, install_dir, &script).await {
                        warnings.push(warning);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(id = %package.id, error = %e, "unreadable package manifest");
                warnings.push(format!("failed to read package manifest: {e}"));
            }
        }

        if let Err(e) = tokio::fs::remove_file(&staging.archive).await {
            tracing::warn!(path = %staging.archive.display(), error = %e, "failed to remove archive");
        }

        let mut manifest = self.store.read()?;
        let mut record = InstalledPackage::new(package.clone(), install_dir.clone());
        if let Some(previous) = manifest.get(&package.id) {
            record.enabled = previous.enabled;
        }
        manifest.upsert(record);
        self.store.write(&manifest)?;
        Ok(())
    }

    /// Best-effort removal of everything `staging` names. Never fails.
    async fn rollback(&self, id: &str, staging: &Staging) {
        if staging.owns_install_dir {
            match tokio::fs::remove_dir_all(&staging.install_dir).await {
                Ok(()) => tracing::debug!(path = %staging.install_dir.display(), "removed install directory"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %staging.install_dir.display(), error = %e, "rollback: failed to remove install directory");
                }
            }
        } else {
            tracing::warn!(path = %staging.install_dir.display(), "rollback: leaving pre-existing install directory in place");
        }
        match tokio::fs::remove_file(&staging.archive).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %staging.archive.display(), error = %e, "rollback: failed to remove archive");
            }
        }

        // The previous install's files are gone, so its record must go too
        if staging.replaced_existing {
            let dropped = self.store.read().and_then(|mut manifest| {
                if manifest.remove(id).is_some() {
                    self.store.write(&manifest)?;
                }
                Ok(())
            });
            if let Err(e) = dropped {
                tracing::warn!(id, error = %e, "rollback: failed to drop manifest record");
            }
        }
    }
}

fn compatibility_warnings(package: &Package, code_tool: Option<&str>) -> Vec<String> {
    let Some(tool) = code_tool else {
        return Vec::new();
    };
    if package.supports_tool(tool) {
        return Vec::new();
    }
    let supported = package.supported_tools.as_deref().unwrap_or_default().join(", ");
    tracing::warn!(package = %package.spec(), tool, "package does not declare support for tool");
    vec![format!(
        "{} does not list '{tool}' among its supported tools ({supported})",
        package.spec()
    )]
}

/// A registry id must name exactly one directory under the target.
fn is_safe_id(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == std::ffi::OsStr::new(id)
    )
}

/// `{id}-{version}{ext}`, the extension taken from the URL path.
fn archive_file_name(package: &Package, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = ArchiveFormat::from_name(path).map_or("", ArchiveFormat::extension);
    let version = package.version.replace(['/', '\\'], "_");
    format!("{}-{version}{ext}", package.id)
}

async fn verify_checksum(archive: &Path, expected: &str) -> Result<()> {
    let path = archive.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || market_fs::checksum::sha256_file(&path))
        .await
        .map_err(std::io::Error::other)??;

    if !market_fs::checksum::checksums_match(expected, &actual) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    tracing::debug!(path = %archive.display(), "checksum verified");
    Ok(())
}

/// Where `uninstall` with `keep_config` parks a package's `config/`.
pub(crate) fn config_stash(target_dir: &Path, id: &str) -> PathBuf {
    target_dir.join(format!(".{id}.config"))
}

/// Move a stashed `config/` back into a fresh install.
async fn restore_config(target_dir: &Path, id: &str, install_dir: &Path) -> Option<String> {
    let stash = config_stash(target_dir, id);
    if !stash.is_dir() {
        return None;
    }
    let config_dir = install_dir.join("config");
    let restored = async {
        if config_dir.exists() {
            tokio::fs::remove_dir_all(&config_dir).await?;
        }
        tokio::fs::rename(&stash, &config_dir).await
    }
    .await;

    match restored {
        Ok(()) => {
            tracing::debug!(id, "restored preserved configuration");
            None
        }
        Err(e) => {
            tracing::warn!(id, error = %e, "failed to restore preserved configuration");
            Some(format!(
                "failed to restore preserved configuration from {}: {e}",
                stash.display()
            ))
        }
    }
}

/// Run the manifest's post-install script; any problem becomes a warning.
async fn run_post_install(package: &Package, install_dir: &Path, script: &str) -> Option<String> {
    let relative = Path::new(script);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !contained {
        return Some(format!("post-install script {script} is outside the package"));
    }

    let path = install_dir.join(relative);
    if !path.is_file() {
        tracing::warn!(id = %package.id, script, "post-install script not found");
        return Some(format!("post-install script not found: {script}"));
    }

    match run_script(&path, install_dir, package).await {
        Ok(outcome) if outcome.success() => None,
        Ok(outcome) => {
            let code = outcome
                .exit_code
                .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
            tracing::warn!(id = %package.id, script, %code, stderr = %outcome.stderr, "post-install script failed");
            let mut warning = format!("post-install script {script} exited with {code}");
            if !outcome.stderr.is_empty() {
                warning.push_str(": ");
                warning.push_str(&outcome.stderr);
            }
            Some(warning)
        }
        Err(e) => {
            tracing::warn!(id = %package.id, script, error = %e, "post-install script could not start");
            Some(format!("post-install script {script} could not start: {e}"))
        }
    }
}
