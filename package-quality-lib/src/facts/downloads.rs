//! Download popularity over the past year.

use crate::estimation::{FactorValue, FetchError};
use crate::facts::registry::encode_package_name;
use crate::facts::resilient_http::get_json;
use chrono::{DateTime, Months, Utc};
use serde::Deserialize;

const LOG_TARGET: &str = " downloads";

/// Default root of the download-range statistics API.
pub const DEFAULT_DOWNLOADS_URL: &str = "https://api.npmjs.org/downloads/range";

#[derive(Debug, Deserialize)]
struct DownloadRange {
    #[serde(default)]
    downloads: Option<Vec<DailyDownloads>>,
}

#[derive(Debug, Deserialize)]
struct DailyDownloads {
    #[serde(default)]
    downloads: u64,
}

/// Computes the downloads factor: `1 - 1/total` over the last year, `0` without downloads.
#[derive(Debug, Clone)]
pub struct Provider {
    client: reqwest::Client,
    base_url: String,
}

impl Provider {
    pub fn new(base_url: Option<&str>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("package-quality/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_DOWNLOADS_URL).trim_end_matches('/').to_string(),
        })
    }

    /// URL of the download range ending `now` and starting one year earlier.
    #[must_use]
    pub fn range_url(&self, name: &str, now: DateTime<Utc>) -> String {
        let from = now.checked_sub_months(Months::new(12)).unwrap_or(now - chrono::Duration::days(365));
        format!(
            "{}/{}:{}/{}",
            self.base_url,
            from.format("%Y-%m-%d"),
            now.format("%Y-%m-%d"),
            encode_package_name(name)
        )
    }

    pub async fn estimate(&self, name: &str) -> Result<FactorValue, FetchError> {
        let url = self.range_url(name, Utc::now());
        let range: DownloadRange = get_json(&self.client, &url).await?;
        let total = total_downloads(&range);

        log::debug!(target: LOG_TARGET, "{name} was downloaded {total} times in the past year");
        Ok(FactorValue::weighted(downloads_quality(total)))
    }
}

fn total_downloads(range: &DownloadRange) -> u64 {
    range
        .downloads
        .as_deref()
        .unwrap_or_default()
        .iter()
        .fold(0_u64, |sum, day| sum.saturating_add(day.downloads))
}

#[expect(clippy::cast_precision_loss, reason = "precision loss past 2^52 downloads is irrelevant to the score")]
fn downloads_quality(total: u64) -> f64 {
    if total == 0 { 0.0 } else { 1.0 - 1.0 / total as f64 }
}
