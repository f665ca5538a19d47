//! Dependency tree construction.
//!
//! The resolver walks a package's declared dependencies depth-first,
//! fetching each one from the registry and checking it against the range
//! its parent declared. Missing packages and incompatible versions abort
//! resolution. Cycles do not: the repeated node is cut off and the tree is
//! flagged `has_circular`.
//!
//! Cycle detection is per path. Each branch carries its own copy of the
//! ids seen between the root and itself, so a package reached through two
//! sibling branches (a diamond) is resolved twice and is not a cycle.

use std::collections::HashSet;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::package::Package;
use crate::registry::PackageRegistry;
use crate::version::is_version_compatible;

/// One resolved edge of a dependency tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyNode {
    pub package: Package,
    /// Range declared by the parent, kept for diagnostics.
    pub version_range: String,
    pub dependencies: Vec<DependencyNode>,
    /// This node closes a cycle, or a cycle exists beneath it.
    pub circular: bool,
}

/// Resolution result for one root package.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyTree {
    pub package: Package,
    pub dependencies: Vec<DependencyNode>,
    /// Number of dependency nodes in the tree, excluding the root.
    pub total_count: usize,
    pub has_circular: bool,
}

impl DependencyTree {
    fn leaf(package: Package, has_circular: bool) -> Self {
        Self {
            package,
            dependencies: Vec::new(),
            total_count: 0,
            has_circular,
        }
    }
}

/// Builds [`DependencyTree`]s against a registry.
pub struct DependencyResolver<'r> {
    registry: &'r dyn PackageRegistry,
}

impl<'r> DependencyResolver<'r> {
    pub fn new(registry: &'r dyn PackageRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the full transitive dependency tree of `package`.
    ///
    /// # Errors
    ///
    /// - [`Error::DependencyNotFound`] when a declared dependency is unknown
    /// - [`Error::VersionMismatch`] when a dependency falls outside its range
    /// - [`Error::Dependency`] wrapping either of the above when raised deeper
    ///   in the tree, naming the direct dependency it was reached through
    pub async fn resolve(&self, package: &Package) -> Result<DependencyTree> {
        self.resolve_path(package, &HashSet::new()).await
    }

    fn resolve_path<'a>(
        &'a self,
        package: &'a Package,
        visited: &'a HashSet<String>,
    ) -> BoxFuture<'a, Result<DependencyTree>> {
        async move {
            if visited.contains(&package.id) {
                tracing::debug!(id = %package.id, "circular dependency, cutting branch");
                return Ok(DependencyTree::leaf(package.clone(), true));
            }

            let mut path = visited.clone();
            path.insert(package.id.clone());

            let mut tree = DependencyTree::leaf(package.clone(), false);
            for (dep_id, range) in &package.dependencies {
                let dependency = self.fetch_dependency(dep_id, range).await?;
                let nested = self
                    .resolve_path(&dependency, &path)
                    .await
                    .map_err(|e| Error::in_dependency(dep_id.clone(), e))?;

                tree.total_count += 1 + nested.total_count;
                tree.has_circular |= nested.has_circular;
                tree.dependencies.push(DependencyNode {
                    package: dependency,
                    version_range: range.clone(),
                    dependencies: nested.dependencies,
                    circular: nested.has_circular,
                });
            }

            Ok(tree)
        }
        .boxed()
    }

    async fn fetch_dependency(&self, id: &str, range: &str) -> Result<Package> {
        let dependency = self
            .registry
            .fetch_package(id)
            .await
            .map_err(|e| Error::in_dependency(id, e))?
            .ok_or_else(|| Error::DependencyNotFound { id: id.to_string() })?;

        if !is_version_compatible(&dependency.version, range) {
            return Err(Error::VersionMismatch {
                id: id.to_string(),
                required: range.to_string(),
                found: dependency.version,
            });
        }
        Ok(dependency)
    }
}
