#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for package-quality
//!
//! This library consolidates all functionality for the package-quality tool, which
//! estimates the quality of npm packages from download popularity, version maturity,
//! and issue-tracker health.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`facts`]: Data collection from the registry, download statistics, and issue tracker
//! - [`estimation`]: Per-package factor merging, aggregation, and continuation handling
//! - [`batch`]: Chunked, rate-budget-aware batch scheduling and the update policy

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod batch;
pub mod estimation;
pub mod facts;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub use crate::commands::{Host, run};
