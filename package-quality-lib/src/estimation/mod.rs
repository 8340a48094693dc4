//! Per-package quality estimation
//!
//! An [`Estimator`] fans out to the factor providers in [`crate::facts`], merges their
//! `[quality, weight]` pairs into an [`Estimation`] and aggregates them into a single score.
//!
//! When a repository has more than one page of issues, the issues factor cannot be
//! computed in a single pass. The estimator then returns
//! [`EstimationResult::Deferred`] with the partial estimation and a [`Continuation`];
//! [`PackageEstimator::resolve_pending`] finishes it later, when the issue tracker's
//! quota allows.

mod aggregator;
mod error;
mod estimator;
mod factors;
mod package_entry;
mod record;

pub use crate::facts::issues::Continuation;
pub use aggregator::aggregate;
pub use error::{EstimateError, FetchError};
pub use estimator::{
    DEFAULT_UPDATE_INTERVAL, EstimationOutcome, EstimationResult, Estimator, EstimatorOptions, PackageEstimator, Resolution,
};
pub use factors::{FactorValue, Factors};
pub(crate) use package_entry::lenient;
pub use package_entry::{PackageEntry, Repository};
pub use record::{Estimation, SOURCE_NPM};
