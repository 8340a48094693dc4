//! When stored packages are estimated again.
//!
//! Packages are normally re-estimated every update interval. A package that has been
//! tracked for more than eleven months and has not been re-estimated more often than once
//! a month is considered stable, and its next check is pushed out by a year.

use crate::estimation::Estimation;
use chrono::{DateTime, Datelike, Months, Utc};

/// Months a package must have been tracked before it can be backed off.
const STABLE_AFTER_MONTHS: u32 = 11;

/// Whether a package with the given stored record should be estimated at `now`.
#[must_use]
pub fn is_due(stored: Option<&Estimation>, now: DateTime<Utc>) -> bool {
    stored.is_none_or(|stored| stored.next_update <= now)
}

/// Carry bookkeeping from the stored record over to a fresh estimation.
///
/// The original `created` is kept and `timesUpdated` incremented. Stable packages get
/// their next update deferred by one year from `lastUpdated`.
#[must_use]
pub fn apply(stored: Option<&Estimation>, mut fresh: Estimation) -> Estimation {
    let Some(stored) = stored else {
        return fresh;
    };

    fresh.created = stored.created;
    fresh.times_updated = stored.times_updated.saturating_add(1);

    let months = months_between(fresh.created, fresh.last_updated);
    if months > STABLE_AFTER_MONTHS
        && fresh.times_updated <= months.saturating_add(1)
        && let Some(next_update) = fresh.last_updated.checked_add_months(Months::new(12))
    {
        fresh.next_update = next_update;
    }

    fresh
}

/// Whole calendar months elapsed from `from` to `to`, zero when `to` is not later.
#[must_use]
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    if to <= from {
        return 0;
    }

    let years = to.year() - from.year();
    let month_delta = i64::from(years) * 12 + i64::from(to.month()) - i64::from(from.month());
    let mut months = u32::try_from(month_delta.max(0)).unwrap_or(u32::MAX);

    // month arithmetic clamps to the end of the month, so the calendar estimate may overshoot
    while months > 0 && from.checked_add_months(Months::new(months)).is_none_or(|candidate| candidate > to) {
        months -= 1;
    }

    months
}
