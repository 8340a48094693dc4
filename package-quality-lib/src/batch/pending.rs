use crate::estimation::{Continuation, Estimation, PackageEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of deferred work in the pending collection.
///
/// A record with a continuation resumes the interrupted issues computation on top of the
/// partial estimation. A record without one belongs to a package whose estimation failed
/// for a retryable reason and is estimated again from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRecord {
    pub name: String,
    pub entry: PackageEntry,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<Estimation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<Continuation>,

    pub created: DateTime<Utc>,
}

impl PendingRecord {
    /// Record an estimation waiting for its remaining issue pages.
    #[must_use]
    pub fn deferred(entry: &PackageEntry, partial: Estimation, continuation: Continuation, now: DateTime<Utc>) -> Self {
        Self {
            name: entry.name.clone(),
            entry: entry.clone(),
            partial: Some(partial),
            continuation: Some(continuation),
            created: now,
        }
    }

    /// Record a package to be estimated again later.
    #[must_use]
    pub fn retry(entry: &PackageEntry, now: DateTime<Utc>) -> Self {
        Self {
            name: entry.name.clone(),
            entry: entry.clone(),
            partial: None,
            continuation: None,
            created: now,
        }
    }

    /// The partial estimation and continuation, when this record resumes an issues computation.
    #[must_use]
    pub fn resumable(&self) -> Option<(&Estimation, &Continuation)> {
        self.partial.as_ref().zip(self.continuation.as_ref())
    }
}
