//! A short-lived, directory-backed JSON cache for registry metadata.
//!
//! Both the versions factor and the package lookup consult the same registry document,
//! so [`Cache`] keeps recent responses on disk for a small TTL. Keys are package names,
//! percent-encoded into flat filenames so scoped names like `@scope/pkg` stay in one
//! directory.

use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::IntoAppError;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     cache";

/// Characters escaped when a key becomes a file name; package names stay readable.
pub(crate) const FILE_NAME_ESCAPES: &AsciiSet = &CONTROLS.add(b'/').add(b'\\').add(b'%').add(b':');

/// Result of loading an entry from the cache.
#[derive(Debug, Clone)]
pub enum CacheResult<T> {
    /// Cached data was found and is still fresh.
    Data(T),

    /// A fresh negative entry exists: the document was recently found to be unavailable.
    NoData(String),

    /// No usable cache entry exists (miss, expired, corrupt, or the cache is disabled).
    Miss,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct Envelope<T> {
    timestamp: DateTime<Utc>,
    payload: EnvelopePayload<T>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
enum EnvelopePayload<T> {
    Data(T),
    NoData(String),
}

/// A TTL-aware, directory-backed JSON cache.
///
/// Freshness is judged against the wall clock at load time, so a single cache can serve
/// a batch run that lasts for hours.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    ttl: Duration,
    ignore: bool,
}

impl Cache {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration, ignore_cache: bool) -> Self {
        Self {
            dir: cache_dir.into(),
            ttl,
            ignore: ignore_cache,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", utf8_percent_encode(key, FILE_NAME_ESCAPES)))
    }

    /// Load the entry stored under `key`.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        self.load_at(key, Utc::now()).await
    }

    async fn load_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> CacheResult<T> {
        if self.ignore || self.ttl.is_zero() {
            return CacheResult::Miss;
        }

        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::trace!(target: LOG_TARGET, "Cache miss for '{key}': {e:#}");
                return CacheResult::Miss;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Discarding corrupt cache entry for '{key}': {e:#}");
                return CacheResult::Miss;
            }
        };

        let age = now.signed_duration_since(envelope.timestamp);
        if age.num_milliseconds() < 0 {
            log::debug!(target: LOG_TARGET, "Cache timestamp is in the future for '{key}' (clock skew detected), treating as fresh");
        } else if age.to_std().unwrap_or(Duration::MAX) >= self.ttl {
            log::trace!(target: LOG_TARGET, "Cache expired for '{key}' (age: {}s)", age.num_seconds());
            return CacheResult::Miss;
        }

        match envelope.payload {
            EnvelopePayload::Data(data) => CacheResult::Data(data),
            EnvelopePayload::NoData(reason) => CacheResult::NoData(reason),
        }
    }

    /// Store `data` under `key`.
    pub async fn save<T: Serialize + Sync>(&self, key: &str, data: &T) -> Result<()> {
        self.write_envelope(
            key,
            &Envelope {
                timestamp: Utc::now(),
                payload: EnvelopePayload::Data(data),
            },
        )
        .await
    }

    /// Store a negative entry under `key`.
    pub async fn save_no_data(&self, key: &str, reason: &str) -> Result<()> {
        self.write_envelope(
            key,
            &Envelope::<()> {
                timestamp: Utc::now(),
                payload: EnvelopePayload::NoData(reason.to_string()),
            },
        )
        .await
    }

    async fn write_envelope<T: Serialize>(&self, key: &str, envelope: &Envelope<T>) -> Result<()> {
        if self.ignore || self.ttl.is_zero() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .into_app_err_with(|| format!("creating directory '{}'", self.dir.display()))?;

        let path = self.path_for(key);
        let json = serde_json::to_vec(envelope).into_app_err_with(|| format!("serializing cache entry for '{key}'"))?;
        tokio::fs::write(&path, json)
            .await
            .into_app_err_with(|| format!("writing cache file '{}'", path.display()))
    }
}
