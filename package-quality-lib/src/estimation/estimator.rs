use super::{EstimateError, Estimation, FactorValue, Factors, FetchError, PackageEntry};
use crate::facts::cache::Cache;
use crate::facts::issues::{self, Continuation, IssuesOutcome};
use crate::facts::{RateBudget, downloads, registry, versions};
use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use std::sync::Arc;

const LOG_TARGET: &str = " estimator";

/// Default time between two estimations of the same package.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// What a single estimation pass produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimationResult {
    /// Every factor is final and the quality has been aggregated.
    Final(Estimation),

    /// The issues factor needs more pages; quality is not computed yet.
    Deferred { partial: Estimation, continuation: Continuation },
}

impl EstimationResult {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Final(estimation) | Self::Deferred { partial: estimation, .. } => &estimation.name,
        }
    }
}

/// An [`EstimationResult`] together with the issue tracker budget observed while computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOutcome {
    pub result: EstimationResult,
    pub budget: Option<RateBudget>,
}

/// A finished continuation, with the budget observed while finishing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub estimation: Estimation,
    pub budget: Option<RateBudget>,
}

/// The per-package operations the batch scheduler drives.
pub trait PackageEstimator: Send + Sync {
    /// Estimate one package from scratch.
    fn estimate(&self, entry: &PackageEntry) -> impl Future<Output = Result<EstimationOutcome, EstimateError>> + Send;

    /// Finish a deferred estimation.
    fn resolve_pending(&self, partial: Estimation, continuation: &Continuation) -> impl Future<Output = Result<Resolution, EstimateError>> + Send;
}

/// Where the estimator's data sources live and how they are accessed.
#[derive(Debug, Clone)]
pub struct EstimatorOptions {
    pub github_token: Option<String>,
    pub registry_url: Option<String>,
    pub downloads_url: Option<String>,
    pub issues_api_url: Option<String>,
    pub registry_cache: Option<Cache>,
    pub max_concurrent_pages: usize,
    pub update_interval: Duration,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            github_token: None,
            registry_url: None,
            downloads_url: None,
            issues_api_url: None,
            registry_cache: None,
            max_concurrent_pages: issues::DEFAULT_MAX_CONCURRENT_PAGES,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

/// Runs the three factor providers for a package and assembles the estimation.
#[derive(Debug, Clone)]
pub struct Estimator {
    registry: Arc<registry::Client>,
    downloads: downloads::Provider,
    versions: versions::Provider,
    issues: issues::Provider,
    update_interval: TimeDelta,
}

impl Estimator {
    pub fn new(options: EstimatorOptions) -> crate::Result<Self> {
        let registry = Arc::new(registry::Client::new(options.registry_url.as_deref(), options.registry_cache)?);

        Ok(Self {
            downloads: downloads::Provider::new(options.downloads_url.as_deref())?,
            versions: versions::Provider::new(Arc::clone(&registry)),
            issues: issues::Provider::new(
                options.github_token.as_deref(),
                options.issues_api_url.as_deref(),
                options.max_concurrent_pages,
            )?,
            registry,
            update_interval: TimeDelta::from_std(options.update_interval).unwrap_or_else(|_| TimeDelta::days(30)),
        })
    }

    /// Resolve a bare package name into a worklist entry using the registry.
    pub async fn lookup(&self, name: &str) -> Result<PackageEntry, EstimateError> {
        self.registry.lookup(name).await.map_err(|e| EstimateError::from_fetch("registry", e))
    }

    fn next_update(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.update_interval
    }
}

impl PackageEstimator for Estimator {
    async fn estimate(&self, entry: &PackageEntry) -> Result<EstimationOutcome, EstimateError> {
        if !entry.has_name() {
            return Err(EstimateError::Validation(serde_json::to_string(entry).unwrap_or_default()));
        }

        let name = entry.name.as_str();
        let now = Utc::now();

        let (downloads, versions, issues) = tokio::join!(
            self.downloads.estimate(name),
            self.versions.estimate(name),
            self.issues.estimate(entry.repository.as_ref()),
        );

        let (issues, budget) = issues.map_err(|e| EstimateError::from_fetch("issues", e))?;

        let estimation = Estimation::new(entry, now, self.next_update(now)).with_factors(Factors {
            downloads: Some(degrade_to_zero("downloads", name, downloads)),
            versions: Some(degrade_to_zero("versions", name, versions)),
            ..Factors::default()
        });

        let result = match issues {
            IssuesOutcome::Complete(factors) => {
                let mut estimation = estimation.with_factors(factors);
                estimation.finalize();
                log::debug!(target: LOG_TARGET, "Estimated {name}: {:.3}", estimation.quality.unwrap_or_default());
                EstimationResult::Final(estimation)
            }
            IssuesOutcome::Partial(continuation) => EstimationResult::Deferred {
                partial: estimation,
                continuation,
            },
        };

        Ok(EstimationOutcome { result, budget })
    }

    async fn resolve_pending(&self, partial: Estimation, continuation: &Continuation) -> Result<Resolution, EstimateError> {
        let (factors, budget) = self
            .issues
            .resolve(continuation)
            .await
            .map_err(|e| EstimateError::from_fetch("issues", e))?;

        let mut estimation = partial.with_factors(factors);
        estimation.finalize();
        log::debug!(target: LOG_TARGET, "Resolved {}: {:.3}", estimation.name, estimation.quality.unwrap_or_default());

        Ok(Resolution { estimation, budget })
    }
}

/// Factors that cannot be measured right now count as zero rather than failing the package.
fn degrade_to_zero(factor: &str, name: &str, value: Result<FactorValue, FetchError>) -> FactorValue {
    value.unwrap_or_else(|e| {
        log::warn!(target: LOG_TARGET, "Could not compute the {factor} factor for {name}, using 0: {e}");
        FactorValue::weighted(0.0)
    })
}
