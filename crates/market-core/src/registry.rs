//! Registry lookup contract and its implementations.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{Error, Result};
use crate::package::Package;

/// Remote package metadata lookup.
///
/// `Ok(None)` means the registry does not know the id. `Err` is reserved
/// for transport and decoding failures.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    async fn fetch_package(&self, id: &str) -> Result<Option<Package>>;
}

/// In-process registry backed by a map.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    packages: RwLock<HashMap<String, Package>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of packages.
    pub fn with_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let registry = Self::new();
        for package in packages {
            registry.publish(package);
        }
        registry
    }

    /// Add or replace a package entry.
    pub fn publish(&self, package: Package) {
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package.id.clone(), package);
    }

    /// Remove a package entry, returning it if present.
    pub fn unpublish(&self, id: &str) -> Option<Package> {
        self.packages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PackageRegistry for MemoryRegistry {
    async fn fetch_package(&self, id: &str) -> Result<Option<Package>> {
        Ok(self
            .packages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

/// Registry reached over HTTP at `GET {base_url}/packages/{id}`.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base_url}/packages/{id}` with `id` percent-encoded as one segment.
    fn package_url(&self, id: &str) -> Result<reqwest::Url> {
        let invalid = |reason: String| Error::Registry {
            message: format!("invalid registry URL {}: {reason}", self.base_url),
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["packages", id]);
        Ok(url)
    }
}

#[async_trait]
impl PackageRegistry for HttpRegistry {
    async fn fetch_package(&self, id: &str) -> Result<Option<Package>> {
        let url = self.package_url(id)?;
        tracing::debug!(%url, "fetching package metadata");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Registry {
                message: format!("GET {url}: {e}"),
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::Registry {
                message: format!("GET {url} returned {}", response.status()),
            });
        }

        let package = response.json::<Package>().await.map_err(|e| Error::Registry {
            message: format!("invalid metadata for '{id}': {e}"),
        })?;
        Ok(Some(package))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn memory_registry_round_trip() {
        let registry = MemoryRegistry::with_packages([Package::new("lib", "2.1.5")]);

        let found = registry.fetch_package("lib").await.unwrap();
        assert_eq!(found.map(|p| p.version), Some("2.1.5".to_string()));
        assert!(registry.fetch_package("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_registry_publish_replaces() {
        let registry = MemoryRegistry::with_packages([Package::new("lib", "1.0.0")]);
        registry.publish(Package::new("lib", "1.1.0"));

        assert_eq!(registry.len(), 1);
        let found = registry.fetch_package("lib").await.unwrap().unwrap();
        assert_eq!(found.version, "1.1.0");
    }

    #[tokio::test]
    async fn http_registry_fetches_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/packages/lib"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "lib",
                "version": "2.1.5",
                "downloadUrl": "https://cdn.example.com/lib.tgz"
            })))
            .mount(&server)
            .await;

        let registry = HttpRegistry::new(format!("{}/", server.uri()));
        let package = registry.fetch_package("lib").await.unwrap().unwrap();

        assert_eq!(package.version, "2.1.5");
        assert_eq!(package.download_url.as_deref(), Some("https://cdn.example.com/lib.tgz"));
    }

    #[test]
    fn package_ids_are_encoded_as_one_segment() {
        let registry = HttpRegistry::new("https://registry.example.com/api/");

        assert_eq!(
            registry.package_url("lib").unwrap().as_str(),
            "https://registry.example.com/api/packages/lib"
        );
        assert_eq!(
            registry.package_url("a/b?c#d").unwrap().as_str(),
            "https://registry.example.com/api/packages/a%2Fb%3Fc%23d"
        );
    }

    #[tokio::test]
    async fn http_registry_requests_encoded_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/packages/team%2Flib"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "team-lib",
                "version": "1.0.0"
            })))
            .mount(&server)
            .await;

        let registry = HttpRegistry::new(server.uri());
        let package = registry.fetch_package("team/lib").await.unwrap().unwrap();

        assert_eq!(package.id, "team-lib");
    }

    #[test]
    fn unparsable_base_url_is_a_registry_error() {
        let err = HttpRegistry::new("not a url").package_url("lib").unwrap_err();
        assert!(matches!(err, Error::Registry { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn http_registry_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/packages/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let registry = HttpRegistry::new(server.uri());
        assert!(registry.fetch_package("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn http_registry_server_error_is_registry_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let registry = HttpRegistry::new(server.uri());
        let err = registry.fetch_package("lib").await.unwrap_err();
        assert!(matches!(err, Error::Registry { .. }), "got {err:?}");
    }
}
