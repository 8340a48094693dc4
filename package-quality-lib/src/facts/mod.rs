//! Data collection for npm packages
//!
//! This module gathers the raw signals a quality estimation is built from. Each data
//! source has its own provider:
//!
//! - **Downloads**: yearly download counts from the download statistics API
//! - **Versions**: the number of published versions, from the registry document
//! - **Issues**: issue-tracker health of the package's source repository
//!
//! The registry document is also used to look packages up by name. Every request goes
//! through [`resilient_http`] for retries and timeouts. The issue tracker is the only
//! quota-limited source; its responses report a [`RateBudget`] that the batch scheduler
//! uses for backpressure.

pub mod cache;
pub mod downloads;
pub mod issues;
pub mod rate_budget;
pub mod registry;
pub(crate) mod resilient_http;
mod repo_info;
mod throttler;
pub mod versions;

pub use rate_budget::RateBudget;
pub use repo_info::RepoInfo;
