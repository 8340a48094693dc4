//! Issue-tracker health of a package's source repository.
//!
//! The first page of issues is fetched during the regular estimation pass. Repositories
//! with more pages yield a [`Continuation`] that is finished later, when the shared quota
//! allows it.

mod client;
mod continuation;
mod provider;

pub use client::{Issue, IssueState};
pub use continuation::{Continuation, IssueCounts};
pub use provider::{DEFAULT_ISSUES_API_URL, DEFAULT_MAX_CONCURRENT_PAGES, IssuesOutcome, Provider};
