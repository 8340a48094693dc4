use chrono::{DateTime, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// The issue tracker's global quota, as reported by its rate-limit response headers.
///
/// Budgets are only ever tightened: when several responses are observed concurrently,
/// the one with the fewest remaining calls defines the current budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBudget {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateBudget {
    #[must_use]
    pub const fn new(remaining: u64, reset_at: DateTime<Utc>) -> Self {
        Self { remaining, reset_at }
    }

    /// Return whichever of the two budgets has fewer remaining calls.
    #[must_use]
    pub const fn tighten(self, other: Self) -> Self {
        if other.remaining < self.remaining { other } else { self }
    }

    /// The most conservative budget among a set of optional observations.
    #[must_use]
    pub fn tightest(budgets: impl IntoIterator<Item = Option<Self>>) -> Option<Self> {
        budgets.into_iter().flatten().reduce(Self::tighten)
    }

    /// How long to wait before issuing `calls` more requests.
    ///
    /// Returns `None` when the budget covers the calls or the reset time has already passed.
    #[must_use]
    pub fn wait_before(&self, calls: u64, now: DateTime<Utc>) -> Option<Duration> {
        if self.remaining >= calls || self.reset_at <= now {
            return None;
        }

        (self.reset_at - now).to_std().ok()
    }
}

/// Fold a new observation into a running budget, keeping the tighter of the two.
pub fn observe(current: &mut Option<RateBudget>, observed: Option<RateBudget>) {
    *current = RateBudget::tightest([*current, observed]);
}
