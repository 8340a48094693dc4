//! Loading the package worklist.
//!
//! The worklist is a registry dump: a JSON object mapping package names to entries, plus
//! an `_updated` bookkeeping key. Document order is preserved.

use crate::Result;
use crate::estimation::PackageEntry;
use ohno::IntoAppError;
use serde_json::{Map, Value};
use std::path::Path;

const LOG_TARGET: &str = "  worklist";
const UPDATED_KEY: &str = "_updated";

/// Parse a worklist document, skipping its first `offset` packages.
///
/// Entries that are not objects are kept as nameless entries so that estimation rejects
/// them with a validation error instead of silently dropping them. An object without a
/// usable name is named after its key.
pub fn parse_worklist(json: &str, offset: usize) -> Result<Vec<PackageEntry>> {
    let document: Map<String, Value> = serde_json::from_str(json).into_app_err("parsing worklist")?;

    let entries: Vec<_> = document
        .into_iter()
        .filter(|(key, _)| key != UPDATED_KEY)
        .skip(offset)
        .map(|(key, value)| {
            if !value.is_object() {
                log::debug!(target: LOG_TARGET, "Worklist entry '{key}' is not an object");
                return PackageEntry::default();
            }

            let mut entry: PackageEntry = serde_json::from_value(value).unwrap_or_else(|e| {
                log::debug!(target: LOG_TARGET, "Worklist entry '{key}' is malformed: {e}");
                PackageEntry::default()
            });
            if !entry.has_name() {
                entry.name = key;
            }
            entry
        })
        .collect();

    log::info!(target: LOG_TARGET, "Loaded {} packages after offset {offset}", entries.len());
    Ok(entries)
}

/// Read and parse the worklist at `path`.
pub async fn load_worklist(path: &Path, offset: usize) -> Result<Vec<PackageEntry>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .into_app_err_with(|| format!("reading worklist '{}'", path.display()))?;

    parse_worklist(&json, offset)
}
