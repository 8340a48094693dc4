//! Package registry metadata.
//!
//! One registry document serves both the versions factor and package lookup, so documents
//! are summarized into a [`PackageMetadata`] and kept in a short-lived [`Cache`].

use crate::estimation::{FetchError, PackageEntry, Repository, lenient};
use crate::facts::cache::{Cache, CacheResult};
use crate::facts::resilient_http::get_json;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "  registry";

/// Default root of the package registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Escape the scope separator of a package name for use as a single URL path segment.
#[must_use]
pub fn encode_package_name(name: &str) -> String {
    name.replace('/', "%2F")
}

/// The parts of a registry document the estimator cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub repository: Option<Repository>,
    pub version_count: usize,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    repository: Option<Repository>,
    #[serde(default, deserialize_with = "lenient")]
    versions: Option<BTreeMap<String, IgnoredAny>>,
}

impl From<RegistryDocument> for PackageMetadata {
    fn from(doc: RegistryDocument) -> Self {
        Self {
            name: doc.name,
            description: doc.description,
            repository: doc.repository,
            version_count: doc.versions.map_or(0, |versions| versions.len()),
        }
    }
}

#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    cache: Option<Cache>,
}

impl Client {
    pub fn new(base_url: Option<&str>, cache: Option<Cache>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("package-quality/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_REGISTRY_URL).trim_end_matches('/').to_string(),
            cache,
        })
    }

    #[must_use]
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, encode_package_name(name))
    }

    /// Fetch the summarized registry document for `name`, consulting the cache first.
    pub async fn metadata(&self, name: &str) -> Result<PackageMetadata, FetchError> {
        let url = self.package_url(name);

        if let Some(cache) = &self.cache {
            match cache.load::<PackageMetadata>(name).await {
                CacheResult::Data(metadata) => return Ok(metadata),
                CacheResult::NoData(reason) => {
                    log::debug!(target: LOG_TARGET, "Registry document for {name} recently unavailable: {reason}");
                    return Err(FetchError::Status { url, status: 404 });
                }
                CacheResult::Miss => {}
            }
        }

        match get_json::<RegistryDocument>(&self.client, &url).await {
            Ok(doc) => {
                let metadata = PackageMetadata::from(doc);
                if let Some(cache) = &self.cache
                    && let Err(e) = cache.save(name, &metadata).await
                {
                    log::debug!(target: LOG_TARGET, "Could not cache registry document for {name}: {e:#}");
                }
                Ok(metadata)
            }
            Err(e) if e.is_not_found() => {
                if let Some(cache) = &self.cache
                    && let Err(cache_err) = cache.save_no_data(name, "not found in registry").await
                {
                    log::debug!(target: LOG_TARGET, "Could not cache missing registry document for {name}: {cache_err:#}");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a package by name and build its worklist entry.
    pub async fn lookup(&self, name: &str) -> Result<PackageEntry, FetchError> {
        let metadata = self.metadata(name).await?;

        Ok(PackageEntry {
            name: metadata.name.unwrap_or_else(|| name.to_string()),
            repository: metadata.repository,
            description: metadata.description,
        })
    }
}
