//! Keyed document collections.
//!
//! The pipeline persists two collections, finished estimations and pending work, both
//! keyed by package name. [`Collection`] is the seam a production document database
//! plugs into; [`MemoryCollection`] and [`FileCollection`] are the built-in backends.

use crate::Result;
use ohno::{IntoAppError, app_err};
use crate::facts::cache::FILE_NAME_ESCAPES;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_TARGET: &str = "     store";

/// A keyed collection of documents.
pub trait Collection<T>: Send + Sync {
    fn find_one(&self, name: &str) -> impl Future<Output = Result<Option<T>>> + Send;

    /// Insert or replace the document stored under `name`.
    fn upsert(&self, name: &str, document: &T) -> impl Future<Output = Result<()>> + Send;

    /// All documents, in key order.
    fn list(&self) -> impl Future<Output = Result<Vec<T>>> + Send;

    /// Remove the document stored under `name`. Removing a missing document is not an error.
    fn delete(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// A collection held in process memory.
#[derive(Debug)]
pub struct MemoryCollection<T> {
    documents: Mutex<BTreeMap<String, T>>,
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self {
            documents: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<T> MemoryCollection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_documents<R>(&self, f: impl FnOnce(&mut BTreeMap<String, T>) -> R) -> Result<R> {
        let mut guard = self.documents.lock().map_err(|_poisoned| app_err!("collection lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl<T: Clone + Send + Sync> Collection<T> for MemoryCollection<T> {
    async fn find_one(&self, name: &str) -> Result<Option<T>> {
        self.with_documents(|documents| documents.get(name).cloned())
    }

    async fn upsert(&self, name: &str, document: &T) -> Result<()> {
        self.with_documents(|documents| {
            let _ = documents.insert(name.to_string(), document.clone());
        })
    }

    async fn list(&self) -> Result<Vec<T>> {
        self.with_documents(|documents| documents.values().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.with_documents(|documents| {
            let _ = documents.remove(name);
        })
    }
}

/// A collection stored as one JSON file per document.
///
/// File names are the percent-encoded document keys, so scoped names such as
/// `@scope/pkg` map to a single flat file.
#[derive(Debug, Clone)]
pub struct FileCollection {
    dir: PathBuf,
}

impl FileCollection {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", utf8_percent_encode(name, FILE_NAME_ESCAPES)))
    }

    fn name_for(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        percent_decode_str(stem).decode_utf8().ok().map(|name| name.into_owned())
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Collection<T> for FileCollection {
    async fn find_one(&self, name: &str) -> Result<Option<T>> {
        let path = self.path_for(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).into_app_err_with(|| format!("reading '{}'", path.display())),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .into_app_err_with(|| format!("parsing '{}'", path.display()))
    }

    async fn upsert(&self, name: &str, document: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .into_app_err_with(|| format!("creating directory '{}'", self.dir.display()))?;

        let path = self.path_for(name);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(document).into_app_err_with(|| format!("serializing document '{name}'"))?;

        tokio::fs::write(&tmp, json)
            .await
            .into_app_err_with(|| format!("writing '{}'", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .into_app_err_with(|| format!("replacing '{}'", path.display()))
    }

    async fn list(&self) -> Result<Vec<T>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).into_app_err_with(|| format!("listing '{}'", self.dir.display())),
        };

        let mut named = BTreeMap::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .into_app_err_with(|| format!("listing '{}'", self.dir.display()))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let Some(name) = Self::name_for(&path) else {
                continue;
            };

            match tokio::fs::read(&path).await.map(|bytes| serde_json::from_slice::<T>(&bytes)) {
                Ok(Ok(document)) => {
                    let _ = named.insert(name, document);
                }
                Ok(Err(e)) => log::warn!(target: LOG_TARGET, "Skipping unreadable document '{}': {e}", path.display()),
                Err(e) => log::warn!(target: LOG_TARGET, "Skipping unreadable document '{}': {e}", path.display()),
            }
        }

        Ok(named.into_values().collect())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).into_app_err_with(|| format!("deleting '{}'", path.display())),
        }
    }
}
