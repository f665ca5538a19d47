//! Dependency resolution and installation for the extension marketplace
//!
//! Resolves a package's transitive dependency tree against a
//! [`PackageRegistry`], orders it for installation, and installs packages
//! durably: download with retry, checksum verification, archive
//! extraction, post-install hooks and a persisted manifest of installed
//! packages, with rollback on failure.
//!
//! # Example
//!
//! ```no_run
//! use market_core::{InstallOptions, MarketConfig, PackageInstaller};
//!
//! # async fn run() -> market_core::Result<()> {
//! let config = MarketConfig::load(None)?;
//! let installer = PackageInstaller::from_config(&config);
//! let outcome = installer.install_package("git-helper", &InstallOptions::default()).await?;
//! for warning in &outcome.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod installer;
pub mod lifecycle;
pub mod package;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod version;

pub use config::{DownloadConfig, MarketConfig};
pub use download::{DownloadPolicy, HttpTransport, Transport, TransportError};
pub use error::{Error, Result};
pub use graph::{detect_circular_dependencies, flatten_dependency_tree, get_unique_dependencies};
pub use installer::{InstallOptions, InstallOutcome, PackageInstaller};
pub use lifecycle::{UninstallOptions, UpdateInfo};
pub use package::{InstallSource, InstalledPackage, Package, PackageManifest};
pub use registry::{HttpRegistry, MemoryRegistry, PackageRegistry};
pub use resolver::{DependencyNode, DependencyResolver, DependencyTree};
pub use store::{InstalledManifest, JsonManifestStore, ManifestStore};
pub use version::{VersionRange, is_version_compatible, parse_version};
