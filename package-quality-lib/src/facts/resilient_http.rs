//! Resilient HTTP request utilities using retry and timeout middleware.
//!
//! Every outbound call made by the factor providers goes through [`resilient_get`], which
//! wraps the request with [`seatbelt`] retry and timeout middleware so that transient
//! network failures are masked before a factor has to degrade.
//!
//! Quota signals (403, or 429 without a usable `Retry-After`) are deliberately not retried
//! here: they are surfaced to the caller so the batch scheduler can pause on the shared budget.

use crate::estimation::FetchError;
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::app_err;
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use serde::de::DeserializeOwned;
use tick::Clock;

/// Timeout for a single request attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts (on top of the original request).
const MAX_RETRY_ATTEMPTS: u32 = 2;

/// Base delay for exponential backoff between retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Longest `Retry-After` we are willing to sit through inside a single request.
const MAX_INLINE_RETRY_AFTER: u64 = 10;

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let s = headers.get(reqwest::header::RETRY_AFTER).and_then(|h| h.to_str().ok())?;
    s.trim().parse::<u64>().ok()
}

/// Classify an HTTP response for retry purposes.
fn should_retry_response(result: &crate::Result<reqwest::Response>) -> RecoveryInfo {
    match result {
        Err(_) => RecoveryInfo::retry(),

        Ok(resp) if resp.status().is_server_error() => RecoveryInfo::retry(),

        // Short throttling pauses are absorbed here, anything longer belongs to the scheduler.
        Ok(resp) if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => match parse_retry_after(resp.headers()) {
            Some(delay) if delay <= MAX_INLINE_RETRY_AFTER => RecoveryInfo::retry().delay(Duration::from_secs(delay)),
            _ => RecoveryInfo::never(),
        },

        _ => RecoveryInfo::never(),
    }
}

/// Send an HTTP GET request with automatic retry and timeout.
///
/// Retries on network errors, 5xx, and briefly-throttled 429 responses with exponential backoff.
pub async fn resilient_get(client: &reqwest::Client, url: &str) -> crate::Result<reqwest::Response> {
    let clock = Clock::new_tokio();
    let context = ResilienceContext::new(&clock).name("http_get");

    let client = client.clone();
    let service = (
        Retry::layer("retry", &context)
            .clone_input()
            .recovery_with(|result: &crate::Result<reqwest::Response>, _| should_retry_response(result))
            .max_retry_attempts(MAX_RETRY_ATTEMPTS)
            .base_delay(RETRY_BASE_DELAY)
            .backoff(Backoff::Exponential)
            .on_retry(|_output, args| {
                log::debug!(
                    "retrying HTTP GET (attempt {}, delay {}ms)",
                    args.attempt().index() + 1,
                    args.retry_delay().as_millis(),
                );
            }),
        Timeout::layer("timeout", &context)
            .timeout_error(|_| app_err!("HTTP request timed out"))
            .timeout(REQUEST_TIMEOUT),
        Execute::new(move |url: String| {
            let client = client.clone();
            async move { client.get(&url).send().await.map_err(ohno::AppError::from) }
        }),
    )
        .into_service();

    service.execute(url.to_string()).await
}

/// GET a JSON document, mapping every failure mode onto a [`FetchError`].
///
/// A 404 is reported as [`FetchError::Status`] so callers can decide whether a missing
/// document means "zero" or "failure".
pub async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T, FetchError> {
    let resp = resilient_get(client, url).await.map_err(|e| FetchError::Transient {
        url: url.to_string(),
        message: format!("{e:#}"),
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = resp.text().await.map_err(|e| FetchError::Transient {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
