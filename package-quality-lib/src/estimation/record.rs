use super::{Factors, PackageEntry, aggregate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag stored on every estimation.
pub const SOURCE_NPM: &str = "npm";

/// The persisted quality record of one package.
///
/// Factor pairs are flattened next to the bookkeeping fields, so a stored document looks
/// like `{"name": "express", "downloads": [0.99, 1], ..., "quality": 0.87}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimation {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub source: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub next_update: DateTime<Utc>,

    #[serde(default)]
    pub times_updated: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,

    #[serde(flatten)]
    pub factors: Factors,
}

impl Estimation {
    /// A fresh, factor-less estimation for `entry`, stamped at `now` and due again at `next_update`.
    #[must_use]
    pub fn new(entry: &PackageEntry, now: DateTime<Utc>, next_update: DateTime<Utc>) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            source: SOURCE_NPM.to_string(),
            created: now,
            last_updated: now,
            next_update,
            times_updated: 0,
            quality: None,
            factors: Factors::default(),
        }
    }

    /// Compute and store the aggregate quality from the current factors.
    pub fn finalize(&mut self) {
        self.quality = Some(aggregate(&self.factors));
    }

    #[must_use]
    pub fn with_factors(mut self, factors: Factors) -> Self {
        self.factors.merge(factors);
        self
    }
}
