//! Issue tracker API client
//!
//! Minimal client for listing a repository's issues one page at a time and classifying
//! each response for the quota-aware provider.

use crate::estimation::FetchError;
use crate::facts::RateBudget;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use url::Url;

const LOG_TARGET: &str = "    issues";

/// Page size requested from the issue listing endpoint.
pub const ISSUES_PER_PAGE: u32 = 100;

/// Minimal issue info with only the fields we need
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Issue {
    #[serde(default)]
    pub state: IssueState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
    #[default]
    #[serde(other)]
    Other,
}

/// One page of the issue listing.
#[derive(Debug, Clone)]
pub struct IssuePage {
    pub issues: Vec<Issue>,

    /// Index of the last page, from the `Link` header; `1` when there is no pagination.
    pub last_page: u32,
}

/// The two JSON shapes the issue listing may answer with.
///
/// A `200` carrying `{"message": ...}` instead of an array means the quota ran out.
#[derive(Deserialize)]
#[serde(untagged)]
enum IssuesBody {
    Issues(Vec<Option<Issue>>),
    Message { message: String },
}

/// Result of an issue tracker API call
#[derive(Debug)]
pub enum IssuesApiResult<T> {
    /// Request succeeded, with rate budget if reported
    Success(T, Option<RateBudget>),

    /// The quota ran out; retry after the reset
    QuotaExhausted(RateBudget),

    /// The repository does not exist (404)
    NotFound(Option<RateBudget>),

    /// Request failed after retries
    Failed(FetchError, Option<RateBudget>),
}

/// Issue tracker API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a new client with optional authentication token and API base URL
    pub fn new(token: Option<&str>, base_url: impl Into<String>) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("package-quality/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one page of the issue listing, covering all states since `since`.
    #[must_use]
    pub fn issues_url(&self, owner: &str, name: &str, page: u32, since: DateTime<Utc>) -> String {
        format!(
            "{}/repos/{owner}/{name}/issues?state=all&per_page={ISSUES_PER_PAGE}&page={page}&since={}",
            self.base_url,
            since.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }

    /// Fetch and classify one page of issues.
    pub async fn issues_page(&self, owner: &str, name: &str, page: u32, since: DateTime<Utc>) -> IssuesApiResult<IssuePage> {
        let url = self.issues_url(owner, name, page, since);

        let resp = match crate::facts::resilient_http::resilient_get(&self.client, &url).await {
            Ok(r) => r,
            Err(e) => {
                return IssuesApiResult::Failed(
                    FetchError::Transient {
                        url,
                        message: format!("{e:#}"),
                    },
                    None,
                );
            }
        };

        let budget = extract_rate_budget_from_headers(resp.headers());
        let status = resp.status();

        if matches!(status.as_u16(), 403 | 429) {
            return IssuesApiResult::QuotaExhausted(budget.unwrap_or_else(exhausted_for_an_hour));
        }

        if status.as_u16() == 404 {
            return IssuesApiResult::NotFound(budget);
        }

        if !status.is_success() {
            return IssuesApiResult::Failed(
                FetchError::Status {
                    url,
                    status: status.as_u16(),
                },
                budget,
            );
        }

        let last_page = last_page_from_headers(resp.headers());
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                return IssuesApiResult::Failed(
                    FetchError::Transient {
                        url,
                        message: e.to_string(),
                    },
                    budget,
                );
            }
        };

        match serde_json::from_str::<IssuesBody>(&body) {
            Ok(IssuesBody::Issues(issues)) => IssuesApiResult::Success(
                IssuePage {
                    issues: issues.into_iter().flatten().collect(),
                    last_page,
                },
                budget,
            ),
            Ok(IssuesBody::Message { message }) => {
                log::debug!(target: LOG_TARGET, "Issue listing for {owner}/{name} answered with '{message}'");
                IssuesApiResult::QuotaExhausted(budget.unwrap_or_else(exhausted_for_an_hour))
            }
            Err(e) => IssuesApiResult::Failed(
                FetchError::Parse {
                    url,
                    message: e.to_string(),
                },
                budget,
            ),
        }
    }
}

/// Budget assumed when the tracker refuses a call without reporting its quota.
fn exhausted_for_an_hour() -> RateBudget {
    RateBudget::new(0, Utc::now() + chrono::Duration::hours(1))
}

/// Extract the rate budget from API response headers
fn extract_rate_budget_from_headers(headers: &HeaderMap) -> Option<RateBudget> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.trim().parse::<u64>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.trim().parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateBudget::new(remaining, reset_at))
}

fn last_page_from_headers(headers: &HeaderMap) -> u32 {
    headers
        .get(LINK)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_last_page)
        .unwrap_or(1)
        .max(1)
}

/// Find the `page` query parameter of the `rel="last"` link in a `Link` header.
fn parse_last_page(link: &str) -> Option<u32> {
    let last = link.split(',').find(|part| part.contains(r#"rel="last""#))?;
    let start = last.find('<')? + 1;
    let end = last.find('>')?;
    let url = Url::parse(last.get(start..end)?).ok()?;

    url.query_pairs().find(|(key, _)| key == "page").and_then(|(_, value)| value.parse().ok())
}
