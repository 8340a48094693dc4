use super::client::{Issue, IssueState};
use crate::estimation::{FactorValue, Factors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issues open for longer than this many days count as long-open.
const LONG_OPEN_DAYS: i64 = 365;

/// Running tallies over the issues seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCounts {
    pub total: u64,
    pub open: u64,
    pub closed: u64,
    pub long_open: u64,
}

impl IssueCounts {
    /// Count one page of issues as of `now`.
    #[must_use]
    pub fn tally(issues: &[Issue], now: DateTime<Utc>) -> Self {
        issues.iter().fold(Self::default(), |mut counts, issue| {
            counts.total += 1;
            match issue.state {
                IssueState::Open => {
                    counts.open += 1;
                    if issue
                        .created_at
                        .is_some_and(|created| now.signed_duration_since(created).num_days() > LONG_OPEN_DAYS)
                    {
                        counts.long_open += 1;
                    }
                }
                IssueState::Closed => counts.closed += 1,
                IssueState::Other => {}
            }
            counts
        })
    }

    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            open: self.open + other.open,
            closed: self.closed + other.closed,
            long_open: self.long_open + other.long_open,
        }
    }

    /// Turn the tallies into the three issue factors, each with weight 1.
    ///
    /// - total: `1 - 1/total`
    /// - open: `1` while at most a fifth of the issues are open, `1.2 - open/total` beyond
    /// - long-open: `1 - longOpen/open`, or `1` with no open issues
    ///
    /// With no issues at all every factor is `0`.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "issue counts stay far below 2^52")]
    pub fn factors(&self) -> Factors {
        if self.total == 0 {
            return issue_factors(0.0, 0.0, 0.0);
        }

        let total = self.total as f64;
        let open = self.open as f64;

        let total_factor = 1.0 - 1.0 / total;
        let open_ratio = open / total;
        let open_factor = if open_ratio > 0.2 { 1.2 - open_ratio } else { 1.0 };
        let long_open_factor = if self.open > 0 {
            1.0 - self.long_open as f64 / open
        } else {
            1.0
        };

        issue_factors(total_factor, open_factor, long_open_factor)
    }
}

const fn issue_factors(total: f64, open: f64, long_open: f64) -> Factors {
    Factors {
        downloads: None,
        versions: None,
        repo_total_issues: Some(FactorValue::weighted(total)),
        repo_open_issues: Some(FactorValue::weighted(open)),
        repo_long_open_issues: Some(FactorValue::weighted(long_open)),
    }
}

/// Where an interrupted issues computation left off.
///
/// Holds the tallies of the pages already seen and the inclusive range of pages still to
/// fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuation {
    pub owner: String,
    pub name: String,

    /// `[next_page, last_page]`, both inclusive.
    pub pages: [u32; 2],

    #[serde(flatten)]
    pub counts: IssueCounts,
}

impl Continuation {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, next_page: u32, last_page: u32, counts: IssueCounts) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            pages: [next_page, last_page],
            counts,
        }
    }

    #[must_use]
    pub const fn next_page(&self) -> u32 {
        let [next, _] = self.pages;
        next
    }

    #[must_use]
    pub const fn last_page(&self) -> u32 {
        let [_, last] = self.pages;
        last
    }

    /// Number of requests needed to finish the computation.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        let [next, last] = self.pages;
        last.checked_sub(next).map_or(0, |span| u64::from(span) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(state: IssueState, created_at: Option<DateTime<Utc>>) -> Issue {
        Issue { state, created_at }
    }

    fn quality(value: Option<FactorValue>) -> f64 {
        value.unwrap().quality
    }

    #[test]
    fn tally_counts_states_and_long_open() {
        let now = Utc::now();
        let issues = vec![
            issue(IssueState::Open, Some(now - chrono::Duration::days(400))),
            issue(IssueState::Open, Some(now - chrono::Duration::days(10))),
            issue(IssueState::Open, None),
            issue(IssueState::Closed, Some(now - chrono::Duration::days(800))),
            issue(IssueState::Other, None),
        ];

        let counts = IssueCounts::tally(&issues, now);
        assert_eq!(
            counts,
            IssueCounts {
                total: 5,
                open: 3,
                closed: 1,
                long_open: 1,
            }
        );
    }

    #[test]
    fn exactly_a_year_is_not_long_open() {
        let now = Utc::now();
        let counts = IssueCounts::tally(&[issue(IssueState::Open, Some(now - chrono::Duration::days(365)))], now);
        assert_eq!(counts.long_open, 0);
    }

    #[test]
    fn five_issues_one_open() {
        let counts = IssueCounts {
            total: 5,
            open: 1,
            closed: 4,
            long_open: 0,
        };

        let factors = counts.factors();
        assert!((quality(factors.repo_total_issues) - 0.8).abs() < 1e-9);
        assert!((quality(factors.repo_open_issues) - 1.0).abs() < 1e-9);
        assert!((quality(factors.repo_long_open_issues) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn many_open_issues_lower_the_open_factor() {
        let counts = IssueCounts {
            total: 10,
            open: 6,
            closed: 4,
            long_open: 3,
        };

        let factors = counts.factors();
        assert!((quality(factors.repo_total_issues) - 0.9).abs() < 1e-9);
        assert!((quality(factors.repo_open_issues) - 0.6).abs() < 1e-9);
        assert!((quality(factors.repo_long_open_issues) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_issues_give_zero_factors() {
        let factors = IssueCounts::default().factors();

        assert_eq!(factors.repo_total_issues, Some(FactorValue::weighted(0.0)));
        assert_eq!(factors.repo_open_issues, Some(FactorValue::weighted(0.0)));
        assert_eq!(factors.repo_long_open_issues, Some(FactorValue::weighted(0.0)));
        assert_eq!(factors.downloads, None);
    }

    #[test]
    fn factors_stay_in_unit_range() {
        for (total, open, long_open) in [(1, 1, 1), (1, 0, 0), (3, 3, 0), (100, 21, 21), (7, 1, 1)] {
            let factors = IssueCounts {
                total,
                open,
                closed: total - open,
                long_open,
            }
            .factors();

            for (_, value) in factors.iter() {
                assert!((0.0..=1.0).contains(&value.quality), "{total}/{open}/{long_open}: {value:?}");
                assert!((value.weight - 1.0).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn merge_is_additive() {
        let a = IssueCounts {
            total: 2,
            open: 1,
            closed: 1,
            long_open: 0,
        };
        let b = IssueCounts {
            total: 3,
            open: 2,
            closed: 0,
            long_open: 1,
        };

        assert_eq!(
            a.merge(b),
            IssueCounts {
                total: 5,
                open: 3,
                closed: 1,
                long_open: 1,
            }
        );
        assert_eq!(a.merge(IssueCounts::default()), a);
    }

    #[test]
    fn continuation_shape() {
        let continuation = Continuation::new(
            "user",
            "pkg",
            2,
            9,
            IssueCounts {
                total: 100,
                open: 10,
                closed: 90,
                long_open: 1,
            },
        );

        assert_eq!(continuation.page_count(), 8);
        assert_eq!(continuation.next_page(), 2);
        assert_eq!(continuation.last_page(), 9);

        let json = serde_json::to_value(&continuation).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"owner": "user", "name": "pkg", "pages": [2, 9], "total": 100, "open": 10, "closed": 90, "longOpen": 1})
        );
    }

    #[test]
    fn empty_page_range_needs_no_requests() {
        let continuation = Continuation::new("o", "r", 5, 4, IssueCounts::default());
        assert_eq!(continuation.page_count(), 0);
    }
}
