use crate::facts::RateBudget;

/// Why a single outbound data-source call did not produce a value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The issue tracker refused the call because its quota ran out.
    #[error("quota exhausted ({} calls remaining until {})", .0.remaining, .0.reset_at)]
    QuotaExhausted(RateBudget),

    /// Network failure or timeout, after retries.
    #[error("request to '{url}' failed: {message}")]
    Transient { url: String, message: String },

    /// The service answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status} from '{url}'")]
    Status { url: String, status: u16 },

    /// The response body did not have the expected shape.
    #[error("unable to parse response from '{url}': {message}")]
    Parse { url: String, message: String },
}

impl FetchError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Why estimating a package failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EstimateError {
    /// The worklist entry cannot be estimated at all. Never retried.
    #[error("entry is null or has no name: {0}")]
    Validation(String),

    /// A factor that cannot degrade gracefully failed.
    #[error("{factor} factor failed: {source}")]
    Fetch {
        factor: &'static str,
        #[source]
        source: FetchError,
    },

    /// The issue tracker's quota ran out; the package should be retried after the reset.
    #[error("issue tracker quota exhausted until {}", .0.reset_at)]
    QuotaExhausted(RateBudget),
}

impl EstimateError {
    /// Build the error for a failed factor, lifting quota exhaustion to its own variant.
    #[must_use]
    pub fn from_fetch(factor: &'static str, source: FetchError) -> Self {
        match source {
            FetchError::QuotaExhausted(budget) => Self::QuotaExhausted(budget),
            source => Self::Fetch { factor, source },
        }
    }

    /// Whether the package should be kept for a later retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }

    /// The budget observed when the failure happened, if any.
    #[must_use]
    pub const fn budget(&self) -> Option<RateBudget> {
        match self {
            Self::QuotaExhausted(budget) => Some(*budget),
            Self::Fetch { .. } | Self::Validation(_) => None,
        }
    }
}
