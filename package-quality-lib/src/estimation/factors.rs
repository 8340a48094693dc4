use serde::{Deserialize, Serialize};

/// A factor's `[quality, weight]` pair.
///
/// Stored documents may contain `null` in place of a number (a non-finite value written by
/// an older run), which loads as `0.0` so aggregation stays well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Option<f64>; 2]", into = "[f64; 2]")]
pub struct FactorValue {
    pub quality: f64,
    pub weight: f64,
}

impl FactorValue {
    #[must_use]
    pub const fn new(quality: f64, weight: f64) -> Self {
        Self { quality, weight }
    }

    /// A factor with full weight.
    #[must_use]
    pub const fn weighted(quality: f64) -> Self {
        Self::new(quality, 1.0)
    }
}

impl From<[Option<f64>; 2]> for FactorValue {
    fn from([quality, weight]: [Option<f64>; 2]) -> Self {
        Self::new(quality.unwrap_or(0.0), weight.unwrap_or(0.0))
    }
}

impl From<FactorValue> for [f64; 2] {
    fn from(value: FactorValue) -> Self {
        [value.quality, value.weight]
    }
}

/// The named factors an estimation carries.
///
/// Each factor is produced by exactly one provider, so merging two partial sets never
/// needs to resolve a conflict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<FactorValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<FactorValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_total_issues: Option<FactorValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_open_issues: Option<FactorValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_long_open_issues: Option<FactorValue>,
}

impl Factors {
    /// Fill in every factor `other` provides.
    pub fn merge(&mut self, other: Self) {
        self.downloads = other.downloads.or(self.downloads);
        self.versions = other.versions.or(self.versions);
        self.repo_total_issues = other.repo_total_issues.or(self.repo_total_issues);
        self.repo_open_issues = other.repo_open_issues.or(self.repo_open_issues);
        self.repo_long_open_issues = other.repo_long_open_issues.or(self.repo_long_open_issues);
    }

    /// All present factors, in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FactorValue)> {
        [
            ("downloads", self.downloads),
            ("versions", self.versions),
            ("repoTotalIssues", self.repo_total_issues),
            ("repoOpenIssues", self.repo_open_issues),
            ("repoLongOpenIssues", self.repo_long_open_issues),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    #[must_use]
    pub fn has_issue_factors(&self) -> bool {
        self.repo_total_issues.is_some() && self.repo_open_issues.is_some() && self.repo_long_open_issues.is_some()
    }
}
