//! [`TestMarket`]: an installer wired to in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use market_core::{
    DownloadPolicy, InstalledManifest, JsonManifestStore, ManifestStore, MemoryRegistry, Package,
    PackageInstaller,
};
use tempfile::TempDir;

use crate::archive::tar_gz_archive;
use crate::transport::MemoryTransport;

/// Base URL for archives published through [`TestMarket::publish`].
pub const ARCHIVE_HOST: &str = "https://packages.test";

/// A temporary packages directory and manifest, a [`MemoryRegistry`], a
/// [`MemoryTransport`] and a [`PackageInstaller`] over all of them.
///
/// Downloads use short timeouts and retry delays.
///
/// # Example
///
/// ```rust,no_run
/// use market_core::InstallOptions;
/// use market_test_utils::TestMarket;
///
/// # async fn demo() {
/// let market = TestMarket::new();
/// market.publish_simple("lib", "2.1.5", &[]);
/// market.installer.install_package("lib", &InstallOptions::default()).await.unwrap();
/// market.assert_installed("lib");
/// # }
/// ```
pub struct TestMarket {
    temp_dir: TempDir,
    pub registry: Arc<MemoryRegistry>,
    pub transport: Arc<MemoryTransport>,
    pub installer: PackageInstaller,
}

impl Default for TestMarket {
    fn default() -> Self {
        Self::new()
    }
}

impl TestMarket {
    pub fn new() -> Self {
        Self::with_policy(DownloadPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            retry_step: Duration::from_millis(10),
        })
    }

    pub fn with_policy(policy: DownloadPolicy) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let transport = Arc::new(MemoryTransport::new());
        let store = Arc::new(JsonManifestStore::new(temp_dir.path().join("installed.json")));
        let installer = PackageInstaller::new(
            registry.clone(),
            transport.clone(),
            store,
            temp_dir.path().join("packages"),
        )
        .with_download_policy(policy);

        Self {
            temp_dir,
            registry,
            transport,
            installer,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root().join("packages")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("installed.json")
    }

    /// Install directory of `id` under the default packages directory.
    pub fn package_dir(&self, id: &str) -> PathBuf {
        self.packages_dir().join(id)
    }

    /// Default archive URL for a package.
    pub fn archive_url(id: &str, version: &str) -> String {
        format!("{ARCHIVE_HOST}/{id}-{version}.tar.gz")
    }

    /// Publish `package` and serve `archive` at its download URL.
    ///
    /// A package without a download URL gets [`Self::archive_url`].
    pub fn publish(&self, mut package: Package, archive: Vec<u8>) -> Package {
        let url = package
            .download_url
            .get_or_insert_with(|| Self::archive_url(&package.id, &package.version))
            .clone();
        self.transport.serve(url, archive);
        self.registry.publish(package.clone());
        package
    }

    /// Publish `id@version` with `dependencies` and a minimal tarball.
    pub fn publish_simple(&self, id: &str, version: &str, dependencies: &[(&str, &str)]) -> Package {
        let package = dependencies
            .iter()
            .fold(Package::new(id, version), |p, (dep, range)| p.with_dependency(*dep, *range));
        let archive = tar_gz_archive(
            &format!("{id}-{version}"),
            &[("README.md", format!("# {id} {version}\n").as_str())],
        );
        self.publish(package, archive)
    }

    pub fn store(&self) -> JsonManifestStore {
        JsonManifestStore::new(self.manifest_path())
    }

    pub fn manifest(&self) -> InstalledManifest {
        self.store().read().unwrap()
    }

    /// Installed ids in manifest order.
    pub fn installed_ids(&self) -> Vec<String> {
        self.manifest().iter().map(|p| p.id().to_string()).collect()
    }

    pub fn assert_installed(&self, id: &str) {
        let manifest = self.manifest();
        let record = manifest
            .get(id)
            .unwrap_or_else(|| panic!("{id} is not in the manifest"));
        assert!(
            record.path.is_dir(),
            "install directory of {id} is missing: {}",
            record.path.display()
        );
    }

    pub fn assert_not_installed(&self, id: &str) {
        assert!(
            !self.manifest().contains(id),
            "{id} is unexpectedly in the manifest"
        );
    }
}
