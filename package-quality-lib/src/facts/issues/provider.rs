use super::client::{Client, IssuesApiResult};
use super::continuation::{Continuation, IssueCounts};
use crate::estimation::{FetchError, Factors, Repository};
use crate::facts::rate_budget::observe;
use crate::facts::throttler::Throttler;
use crate::facts::{RateBudget, RepoInfo};
use chrono::{DateTime, Months, Utc};
use futures_util::future::join_all;
use std::sync::Arc;

const LOG_TARGET: &str = "    issues";

/// Default API root of the issue tracker.
pub const DEFAULT_ISSUES_API_URL: &str = "https://api.github.com";

/// Default number of continuation pages fetched concurrently.
pub const DEFAULT_MAX_CONCURRENT_PAGES: usize = 8;

/// What the first pass over a repository's issues produced.
#[derive(Debug, Clone, PartialEq)]
pub enum IssuesOutcome {
    /// All issues fit on the first page; the factors are final.
    Complete(Factors),

    /// More pages remain; the computation continues from the continuation.
    Partial(Continuation),
}

/// Computes the three issue factors for a package's repository.
#[derive(Debug, Clone)]
pub struct Provider {
    client: Client,
    max_concurrent_pages: usize,
}

impl Provider {
    pub fn new(token: Option<&str>, base_url: Option<&str>, max_concurrent_pages: usize) -> crate::Result<Self> {
        Ok(Self {
            client: Client::new(token, base_url.unwrap_or(DEFAULT_ISSUES_API_URL))?,
            max_concurrent_pages,
        })
    }

    /// Fetch the first page of issues and either finish or hand back a continuation.
    ///
    /// Packages without a usable repository, or whose repository no longer exists, get
    /// zero-valued factors.
    pub async fn estimate(&self, repository: Option<&Repository>) -> Result<(IssuesOutcome, Option<RateBudget>), FetchError> {
        let info = RepoInfo::extract(repository);
        if !info.valid {
            return Ok((IssuesOutcome::Complete(IssueCounts::default().factors()), None));
        }

        let now = Utc::now();
        match self.client.issues_page(&info.owner, &info.name, 1, since(now)).await {
            IssuesApiResult::Success(page, budget) => {
                let counts = IssueCounts::tally(&page.issues, now);
                let outcome = if page.last_page > 1 {
                    log::debug!(target: LOG_TARGET, "{info} has {} pages of issues, deferring the rest", page.last_page);
                    IssuesOutcome::Partial(Continuation::new(info.owner, info.name, 2, page.last_page, counts))
                } else {
                    IssuesOutcome::Complete(counts.factors())
                };

                Ok((outcome, budget))
            }

            IssuesApiResult::QuotaExhausted(budget) => Err(FetchError::QuotaExhausted(budget)),

            IssuesApiResult::NotFound(budget) => {
                log::debug!(target: LOG_TARGET, "Repository {info} not found, using zero issue factors");
                Ok((IssuesOutcome::Complete(IssueCounts::default().factors()), budget))
            }

            IssuesApiResult::Failed(e, _) => Err(e),
        }
    }

    /// Finish an interrupted computation and return the final issue factors.
    pub async fn resolve(&self, continuation: &Continuation) -> Result<(Factors, Option<RateBudget>), FetchError> {
        let (counts, budget) = self.resolve_counts(continuation).await?;
        Ok((counts.factors(), budget))
    }

    /// Fetch the remaining pages in parallel and fold them into the continuation's tallies.
    ///
    /// A page that fails for a transient reason contributes nothing. If any page reports an
    /// exhausted quota the whole resolution fails, and pages still queued are not requested.
    pub async fn resolve_counts(&self, continuation: &Continuation) -> Result<(IssueCounts, Option<RateBudget>), FetchError> {
        let now = Utc::now();
        let since = since(now);
        let throttler = Throttler::new(self.max_concurrent_pages);

        let fetches = (continuation.next_page()..=continuation.last_page()).map(|page| {
            let throttler = Arc::clone(&throttler);
            async move {
                let _permit = throttler.acquire().await?;
                let result = self.client.issues_page(&continuation.owner, &continuation.name, page, since).await;
                if matches!(result, IssuesApiResult::QuotaExhausted(_)) {
                    throttler.trip();
                }
                Some((page, result))
            }
        });

        let mut counts = continuation.counts;
        let mut budget = None;
        let mut exhausted: Option<RateBudget> = None;

        for (page, result) in join_all(fetches).await.into_iter().flatten() {
            match result {
                IssuesApiResult::Success(issues, observed) => {
                    counts = counts.merge(IssueCounts::tally(&issues.issues, now));
                    observe(&mut budget, observed);
                }
                IssuesApiResult::QuotaExhausted(observed) => observe(&mut exhausted, Some(observed)),
                IssuesApiResult::NotFound(observed) => {
                    log::warn!(target: LOG_TARGET, "Page {page} of {}/{} issues not found, counting it as empty", continuation.owner, continuation.name);
                    observe(&mut budget, observed);
                }
                IssuesApiResult::Failed(e, observed) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch page {page} of {}/{} issues, counting it as empty: {e}", continuation.owner, continuation.name);
                    observe(&mut budget, observed);
                }
            }
        }

        if let Some(exhausted) = exhausted {
            return Err(FetchError::QuotaExhausted(exhausted));
        }

        Ok((counts, budget))
    }
}

/// Only issues updated during the past year are considered.
fn since(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(12)).unwrap_or(now - chrono::Duration::days(365))
}
