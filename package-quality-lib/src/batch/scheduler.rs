use super::pending::PendingRecord;
use super::store::Collection;
use super::update_policy;
use crate::Result;
use crate::estimation::{Continuation, EstimateError, Estimation, EstimationOutcome, EstimationResult, PackageEntry, PackageEstimator, Resolution};
use crate::facts::RateBudget;
use crate::facts::rate_budget::observe;
use chrono::{DateTime, Utc};
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use futures_util::future::join_all;
use ohno::{IntoAppError, bail};
use std::sync::Arc;

const LOG_TARGET: &str = " scheduler";

/// Default bound on a single store operation.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a batch run behaves.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Packages per chunk; the whole worklist when `None`.
    pub chunk_size: Option<usize>,

    /// Bound on every store operation.
    pub store_timeout: Duration,

    /// Resolve continuations right after the chunk that produced them.
    pub resolve_inline: bool,

    /// Skip packages whose stored record is not yet due.
    pub respect_schedule: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            chunk_size: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            resolve_inline: true,
            respect_schedule: false,
        }
    }
}

/// Counters describing a finished batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub chunks_processed: usize,

    /// Packages estimated in a single pass and persisted.
    pub estimated: usize,

    /// Packages not yet due for re-estimation.
    pub skipped: usize,

    /// Packages whose issues computation was deferred.
    pub deferred: usize,

    /// Deferred computations finished and persisted.
    pub resolved: usize,

    /// Packages that failed for a retryable reason and were kept as pending.
    pub failed: usize,

    /// Of the retryable failures, those caused by the issue tracker's quota.
    pub quota_exhausted: usize,

    /// Entries rejected as unusable.
    pub invalid: usize,

    /// Store operations that failed or timed out.
    pub store_failures: usize,

    /// Total time spent waiting for the issue tracker's quota to reset.
    pub waited: Duration,
}

impl BatchReport {
    fn absorb(&mut self, other: &Self) {
        self.chunks_processed += other.chunks_processed;
        self.estimated += other.estimated;
        self.skipped += other.skipped;
        self.deferred += other.deferred;
        self.resolved += other.resolved;
        self.failed += other.failed;
        self.quota_exhausted += other.quota_exhausted;
        self.invalid += other.invalid;
        self.store_failures += other.store_failures;
        self.waited += other.waited;
    }
}

/// Persistence bookkeeping for one chunk.
#[derive(Debug, Default)]
struct StoreTally {
    attempted: usize,
    failed: usize,
}

impl StoreTally {
    const fn record(&mut self, ok: bool) -> bool {
        self.attempted += 1;
        if !ok {
            self.failed += 1;
        }
        ok
    }

    const fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Where the packages of a run come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Worklist,
    Pending,
}

enum EntryOutcome<'a> {
    Skipped,
    StoreFailed,
    Estimated {
        entry: &'a PackageEntry,
        stored: Option<Estimation>,
        outcome: EstimationOutcome,
    },
    Failed {
        entry: &'a PackageEntry,
        error: EstimateError,
    },
}

/// A source of the current time, replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Runs estimations over a worklist in sequential chunks, pausing on the issue tracker's quota.
///
/// Packages within a chunk are estimated concurrently. After each chunk, final estimations
/// are persisted, deferred ones go to the pending collection (and are resolved right away
/// when inline resolution is on), and the tightest budget observed decides whether to wait
/// for the quota reset before the next chunk.
pub struct BatchScheduler<E, P, Q> {
    estimator: E,
    packages: P,
    pending: Q,
    options: SchedulerOptions,
    clock: Clock,
}

impl<E, P, Q> Debug for BatchScheduler<E, P, Q> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BatchScheduler").field("options", &self.options).finish_non_exhaustive()
    }
}

impl<E, P, Q> BatchScheduler<E, P, Q>
where
    E: PackageEstimator,
    P: Collection<Estimation>,
    Q: Collection<PendingRecord>,
{
    pub fn new(estimator: E, packages: P, pending: Q, options: SchedulerOptions) -> Self {
        Self {
            estimator,
            packages,
            pending,
            options,
            clock: Arc::new(Utc::now),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub const fn estimator(&self) -> &E {
        &self.estimator
    }

    #[must_use]
    pub const fn packages(&self) -> &P {
        &self.packages
    }

    #[must_use]
    pub const fn pending(&self) -> &Q {
        &self.pending
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn chunk_size(&self, total: usize) -> usize {
        self.options.chunk_size.unwrap_or(total).max(1)
    }

    /// Estimate every package of the worklist.
    ///
    /// Per-package failures never fail the run. The run is aborted only when every store
    /// operation of a chunk fails.
    pub async fn run_batch(&self, worklist: &[PackageEntry]) -> Result<BatchReport> {
        self.run_entries(worklist, Origin::Worklist).await
    }

    /// Work through the pending collection.
    ///
    /// Continuations are resumed serially, waiting for the quota when their page count
    /// exceeds the remaining budget. Records without a continuation are estimated again
    /// like a worklist. An unreadable pending collection aborts the run.
    pub async fn run_pending(&self) -> Result<BatchReport> {
        let records = self.guarded("list pending", self.pending.list()).await?;

        let (resumable, retries): (Vec<_>, Vec<_>) = records.into_iter().partition(|record| record.resumable().is_some());
        log::info!(
            target: LOG_TARGET,
            "Found {} pending continuations and {} packages to retry",
            resumable.len(),
            retries.len()
        );

        let mut report = BatchReport::default();
        let chunk_size = self.chunk_size(resumable.len());
        let mut budget = None;

        for (index, chunk) in resumable.chunks(chunk_size).enumerate() {
            let mut tally = StoreTally::default();

            for record in chunk {
                let stored = match self.guarded("find", self.packages.find_one(&record.name)).await {
                    Ok(stored) => stored,
                    Err(e) => {
                        let _ = tally.record(false);
                        report.store_failures += 1;
                        log::warn!(target: LOG_TARGET, "Could not look up stored record of {}: {e:#}", record.name);
                        continue;
                    }
                };

                self.finish_deferred(record, stored.as_ref(), &mut budget, &mut tally, &mut report)
                    .await;
            }

            report.chunks_processed += 1;
            if tally.all_failed() {
                bail!("every store operation of pending chunk {} failed, aborting", index + 1);
            }
        }

        let entries: Vec<_> = retries.into_iter().map(|record| record.entry).collect();
        let retried = self.run_entries(&entries, Origin::Pending).await?;
        report.absorb(&retried);

        Ok(report)
    }

    async fn run_entries(&self, entries: &[PackageEntry], origin: Origin) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if entries.is_empty() {
            return Ok(report);
        }

        let chunk_size = self.chunk_size(entries.len());
        let chunk_count = entries.len().div_ceil(chunk_size);
        let calls_per_chunk = u64::try_from(chunk_size).unwrap_or(u64::MAX);

        for (index, chunk) in entries.chunks(chunk_size).enumerate() {
            log::info!(target: LOG_TARGET, "Processing chunk {}/{chunk_count} ({} packages)", index + 1, chunk.len());

            let outcomes = join_all(chunk.iter().map(|entry| self.process_entry(entry))).await;

            let mut budget = None;
            let mut tally = StoreTally::default();
            let mut deferred = Vec::new();

            for outcome in outcomes {
                match outcome {
                    EntryOutcome::Skipped => report.skipped += 1,

                    EntryOutcome::StoreFailed => {
                        let _ = tally.record(false);
                        report.store_failures += 1;
                    }

                    EntryOutcome::Estimated { entry, stored, outcome } => {
                        observe(&mut budget, outcome.budget);
                        match outcome.result {
                            EstimationResult::Final(estimation) => {
                                if tally.record(self.save_final(stored.as_ref(), estimation).await) {
                                    report.estimated += 1;
                                    // a final estimation supersedes any pending work for the package
                                    let _ = tally.record(self.delete_pending(&entry.name).await);
                                } else {
                                    report.store_failures += 1;
                                }
                            }

                            EstimationResult::Deferred { partial, continuation } => {
                                let record = PendingRecord::deferred(entry, partial, continuation, self.now());
                                if !tally.record(self.save_pending(&record).await) {
                                    report.store_failures += 1;
                                }
                                report.deferred += 1;
                                deferred.push((record, stored));
                            }
                        }
                    }

                    EntryOutcome::Failed { entry, error } => {
                        observe(&mut budget, error.budget());
                        if error.is_retryable() {
                            log::warn!(target: LOG_TARGET, "Keeping {} for a later retry: {error}", entry.name);
                            report.failed += 1;
                            if matches!(error, EstimateError::QuotaExhausted(_)) {
                                report.quota_exhausted += 1;
                            }
                            if origin == Origin::Worklist && !tally.record(self.save_pending(&PendingRecord::retry(entry, self.now())).await) {
                                report.store_failures += 1;
                            }
                        } else {
                            log::error!(target: LOG_TARGET, "Dropping unusable entry: {error}");
                            report.invalid += 1;
                            if origin == Origin::Pending && entry.has_name() {
                                let _ = tally.record(self.delete_pending(&entry.name).await);
                            }
                        }
                    }
                }
            }

            if self.options.resolve_inline {
                for (record, stored) in &deferred {
                    self.finish_deferred(record, stored.as_ref(), &mut budget, &mut tally, &mut report)
                        .await;
                }
            }

            report.chunks_processed += 1;
            if tally.all_failed() {
                bail!("every store operation of chunk {}/{chunk_count} failed, aborting", index + 1);
            }

            if index + 1 < chunk_count
                && let Some(budget) = budget
                && let Some(wait) = budget.wait_before(calls_per_chunk, self.now())
            {
                log::info!(
                    target: LOG_TARGET,
                    "Only {} issue tracker calls left, waiting {}s for the quota to reset",
                    budget.remaining,
                    wait.as_secs()
                );
                tokio::time::sleep(wait).await;
                report.waited += wait;
            }
        }

        log::info!(
            target: LOG_TARGET,
            "Finished {} chunks: {} estimated, {} deferred, {} resolved, {} skipped, {} failed",
            report.chunks_processed,
            report.estimated,
            report.deferred,
            report.resolved,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    async fn process_entry<'a>(&self, entry: &'a PackageEntry) -> EntryOutcome<'a> {
        let mut stored = None;

        if entry.has_name() {
            stored = match self.guarded("find", self.packages.find_one(&entry.name)).await {
                Ok(stored) => stored,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not look up stored record of {}: {e:#}", entry.name);
                    return EntryOutcome::StoreFailed;
                }
            };

            if self.options.respect_schedule && !update_policy::is_due(stored.as_ref(), self.now()) {
                log::debug!(target: LOG_TARGET, "{} is not due yet", entry.name);
                return EntryOutcome::Skipped;
            }
        }

        match self.estimator.estimate(entry).await {
            Ok(outcome) => EntryOutcome::Estimated { entry, stored, outcome },
            Err(error) => EntryOutcome::Failed { entry, error },
        }
    }

    /// Resolve a deferred record, waiting first if the budget cannot cover its pages.
    async fn finish_deferred(
        &self,
        record: &PendingRecord,
        stored: Option<&Estimation>,
        budget: &mut Option<RateBudget>,
        tally: &mut StoreTally,
        report: &mut BatchReport,
    ) {
        let Some((partial, continuation)) = record.resumable() else {
            return;
        };

        self.wait_for_pages(continuation, budget, report).await;

        match self.estimator.resolve_pending(partial.clone(), continuation).await {
            Ok(Resolution { estimation, budget: observed }) => {
                observe(budget, observed);
                if tally.record(self.save_final(stored, estimation).await) {
                    report.resolved += 1;
                    let _ = tally.record(self.delete_pending(&record.name).await);
                } else {
                    report.store_failures += 1;
                }
            }
            Err(error) => {
                observe(budget, error.budget());
                if matches!(error, EstimateError::QuotaExhausted(_)) {
                    report.quota_exhausted += 1;
                }
                report.failed += 1;
                log::warn!(target: LOG_TARGET, "Leaving {} pending: {error}", record.name);
            }
        }
    }

    async fn wait_for_pages(&self, continuation: &Continuation, budget: &mut Option<RateBudget>, report: &mut BatchReport) {
        let Some(current) = *budget else {
            return;
        };

        if let Some(wait) = current.wait_before(continuation.page_count(), self.now()) {
            log::info!(
                target: LOG_TARGET,
                "{} pages needed for {}/{} but only {} calls left, waiting {}s",
                continuation.page_count(),
                continuation.owner,
                continuation.name,
                current.remaining,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
            report.waited += wait;

            // the quota has been refreshed, older observations no longer apply
            *budget = None;
        }
    }

    async fn save_final(&self, stored: Option<&Estimation>, estimation: Estimation) -> bool {
        let estimation = update_policy::apply(stored, estimation);
        match self.guarded("upsert", self.packages.upsert(&estimation.name, &estimation)).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not store estimation of {}: {e:#}", estimation.name);
                false
            }
        }
    }

    async fn save_pending(&self, record: &PendingRecord) -> bool {
        match self.guarded("upsert pending", self.pending.upsert(&record.name, record)).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not store pending record of {}: {e:#}", record.name);
                false
            }
        }
    }

    async fn delete_pending(&self, name: &str) -> bool {
        match self.guarded("delete pending", self.pending.delete(name)).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not remove pending record of {name}: {e:#}");
                false
            }
        }
    }

    async fn guarded<T>(&self, operation: &str, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.options.store_timeout, future)
            .await
            .into_app_err_with(|| format!("store operation '{operation}' timed out after {:?}", self.options.store_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::store::MemoryCollection;
    use crate::estimation::{FactorValue, Factors};
    use crate::facts::issues::IssueCounts;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// What the fake estimator does for a given package.
    #[derive(Debug, Clone)]
    enum Script {
        Final(f64, Option<RateBudget>),
        Defer(u32, Option<RateBudget>),
        Fail(EstimateError),
    }

    #[derive(Debug, Default)]
    struct FakeEstimator {
        scripts: HashMap<String, Script>,
        resolve_budget: Option<RateBudget>,
        resolve_error: Option<EstimateError>,
        estimated: Mutex<Vec<String>>,
        resolved: Mutex<Vec<String>>,
    }

    impl FakeEstimator {
        fn with(mut self, name: &str, script: Script) -> Self {
            let _ = self.scripts.insert(name.to_string(), script);
            self
        }
    }

    impl PackageEstimator for FakeEstimator {
        async fn estimate(&self, entry: &PackageEntry) -> core::result::Result<EstimationOutcome, EstimateError> {
            if !entry.has_name() {
                return Err(EstimateError::Validation("{}".to_string()));
            }

            self.estimated.lock().unwrap().push(entry.name.clone());
            let now = Utc::now();
            let partial = Estimation::new(entry, now, now + chrono::TimeDelta::days(30)).with_factors(Factors {
                downloads: Some(FactorValue::weighted(0.5)),
                ..Factors::default()
            });

            match self.scripts.get(&entry.name).cloned().unwrap_or(Script::Final(0.5, None)) {
                Script::Final(quality, budget) => {
                    let mut estimation = partial;
                    estimation.factors.downloads = Some(FactorValue::weighted(quality));
                    estimation.finalize();
                    Ok(EstimationOutcome {
                        result: EstimationResult::Final(estimation),
                        budget,
                    })
                }
                Script::Defer(last_page, budget) => Ok(EstimationOutcome {
                    result: EstimationResult::Deferred {
                        partial,
                        continuation: Continuation::new("o", entry.name.clone(), 2, last_page, IssueCounts::default()),
                    },
                    budget,
                }),
                Script::Fail(error) => Err(error),
            }
        }

        async fn resolve_pending(&self, partial: Estimation, continuation: &Continuation) -> core::result::Result<Resolution, EstimateError> {
            self.resolved.lock().unwrap().push(continuation.name.clone());
            if let Some(error) = &self.resolve_error {
                return Err(error.clone());
            }

            let mut estimation = partial.with_factors(IssueCounts::default().factors());
            estimation.finalize();
            Ok(Resolution {
                estimation,
                budget: self.resolve_budget,
            })
        }
    }

    /// A collection whose every operation fails.
    #[derive(Debug, Default)]
    struct BrokenCollection;

    impl<T: Send + Sync> Collection<T> for BrokenCollection {
        async fn find_one(&self, _name: &str) -> Result<Option<T>> {
            bail!("store unreachable")
        }

        async fn upsert(&self, _name: &str, _document: &T) -> Result<()> {
            bail!("store unreachable")
        }

        async fn list(&self) -> Result<Vec<T>> {
            bail!("store unreachable")
        }

        async fn delete(&self, _name: &str) -> Result<()> {
            bail!("store unreachable")
        }
    }

    fn entries(names: &[&str]) -> Vec<PackageEntry> {
        names.iter().map(|name| PackageEntry::named(*name)).collect()
    }

    fn scheduler(estimator: FakeEstimator, options: SchedulerOptions) -> BatchScheduler<FakeEstimator, MemoryCollection<Estimation>, MemoryCollection<PendingRecord>> {
        BatchScheduler::new(estimator, MemoryCollection::new(), MemoryCollection::new(), options)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn final_estimations_are_stored() {
        let scheduler = scheduler(FakeEstimator::default(), SchedulerOptions::default());

        let report = scheduler.run_batch(&entries(&["a", "b", "c"])).await.unwrap();

        assert_eq!(report.chunks_processed, 1);
        assert_eq!(report.estimated, 3);
        assert_eq!(scheduler.packages().list().await.unwrap().len(), 3);
        assert!(scheduler.pending().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunks_follow_the_chunk_size() {
        let options = SchedulerOptions {
            chunk_size: Some(2),
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(FakeEstimator::default(), options);

        let report = scheduler.run_batch(&entries(&["a", "b", "c", "d", "e"])).await.unwrap();

        assert_eq!(report.chunks_processed, 3);
        assert_eq!(report.estimated, 5);
    }

    #[tokio::test]
    async fn zero_chunk_size_is_clamped() {
        let options = SchedulerOptions {
            chunk_size: Some(0),
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(FakeEstimator::default(), options);

        let report = scheduler.run_batch(&entries(&["a", "b"])).await.unwrap();
        assert_eq!(report.chunks_processed, 2);
    }

    #[tokio::test]
    async fn empty_worklist_does_nothing() {
        let scheduler = scheduler(FakeEstimator::default(), SchedulerOptions::default());
        assert_eq!(scheduler.run_batch(&[]).await.unwrap(), BatchReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_reset_when_budget_is_short() {
        let now = at(1_000_000);
        let budget = Some(RateBudget::new(5, now + chrono::TimeDelta::seconds(60)));
        let estimator = FakeEstimator::default().with("a", Script::Final(0.9, budget));
        let options = SchedulerOptions {
            chunk_size: Some(10),
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(estimator, options).with_clock(move || now);

        let names: Vec<String> = (0..20).map(|i| if i == 0 { "a".to_string() } else { format!("p{i}") }).collect();
        let worklist: Vec<_> = names.iter().map(PackageEntry::named).collect();

        let start = tokio::time::Instant::now();
        let report = scheduler.run_batch(&worklist).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60_000));
        assert_eq!(report.waited, Duration::from_secs(60));
        assert_eq!(report.chunks_processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_after_the_last_chunk() {
        let now = at(1_000_000);
        let budget = Some(RateBudget::new(0, now + chrono::TimeDelta::seconds(600)));
        let estimator = FakeEstimator::default().with("a", Script::Final(0.9, budget));
        let scheduler = scheduler(estimator, SchedulerOptions::default()).with_clock(move || now);

        let report = scheduler.run_batch(&entries(&["a", "b"])).await.unwrap();
        assert_eq!(report.waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_when_budget_is_sufficient() {
        let now = at(1_000_000);
        let budget = Some(RateBudget::new(10, now + chrono::TimeDelta::seconds(60)));
        let estimator = FakeEstimator::default().with("a", Script::Final(0.9, budget));
        let options = SchedulerOptions {
            chunk_size: Some(2),
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(estimator, options).with_clock(move || now);

        let report = scheduler.run_batch(&entries(&["a", "b", "c"])).await.unwrap();
        assert_eq!(report.waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn deferred_packages_are_resolved_inline() {
        let estimator = FakeEstimator::default().with("big", Script::Defer(4, None));
        let scheduler = scheduler(estimator, SchedulerOptions::default());

        let report = scheduler.run_batch(&entries(&["big", "small"])).await.unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.estimated, 1);
        assert!(scheduler.pending().list().await.unwrap().is_empty());

        let stored = scheduler.packages().find_one("big").await.unwrap().unwrap();
        assert!(stored.quality.is_some());
        assert!(stored.factors.has_issue_factors());
    }

    #[tokio::test]
    async fn deferred_packages_stay_pending_without_inline_resolution() {
        let estimator = FakeEstimator::default().with("big", Script::Defer(4, None));
        let options = SchedulerOptions {
            resolve_inline: false,
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(estimator, options);

        let report = scheduler.run_batch(&entries(&["big"])).await.unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(report.resolved, 0);
        assert!(scheduler.packages().find_one("big").await.unwrap().is_none());

        let pending = scheduler.pending().find_one("big").await.unwrap().unwrap();
        assert_eq!(pending.continuation.unwrap().pages, [2, 4]);
        assert!(pending.partial.unwrap().quality.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_resolution_waits_when_pages_exceed_budget() {
        let now = at(2_000_000);
        let budget = Some(RateBudget::new(3, now + chrono::TimeDelta::seconds(120)));
        let estimator = FakeEstimator::default().with("big", Script::Defer(10, budget));
        let scheduler = scheduler(estimator, SchedulerOptions::default()).with_clock(move || now);

        let report = scheduler.run_batch(&entries(&["big"])).await.unwrap();

        assert_eq!(report.waited, Duration::from_secs(120));
        assert_eq!(report.resolved, 1);
    }

    #[tokio::test]
    async fn failed_packages_are_kept_pending() {
        let quota = RateBudget::new(0, Utc::now() + chrono::TimeDelta::minutes(30));
        let estimator = FakeEstimator::default()
            .with("flaky", Script::Fail(EstimateError::QuotaExhausted(quota)))
            .with(
                "broken",
                Script::Fail(EstimateError::Fetch {
                    factor: "issues",
                    source: crate::estimation::FetchError::Status {
                        url: "u".to_string(),
                        status: 500,
                    },
                }),
            );
        let scheduler = scheduler(estimator, SchedulerOptions::default());

        let mut worklist = entries(&["flaky", "broken", "fine"]);
        worklist.push(PackageEntry::default());
        let report = scheduler.run_batch(&worklist).await.unwrap();

        assert_eq!(report.estimated, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.quota_exhausted, 1);
        assert_eq!(report.invalid, 1);

        let pending: Vec<_> = scheduler.pending().list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(pending, ["broken", "flaky"]);
    }

    #[tokio::test]
    async fn schedule_is_respected() {
        let options = SchedulerOptions {
            respect_schedule: true,
            ..SchedulerOptions::default()
        };
        let scheduler = scheduler(FakeEstimator::default(), options);
        let now = Utc::now();

        let mut fresh = Estimation::new(&PackageEntry::named("fresh"), now, now + chrono::TimeDelta::seconds(60));
        fresh.finalize();
        let mut stale = Estimation::new(&PackageEntry::named("stale"), now - chrono::TimeDelta::days(40), now - chrono::TimeDelta::seconds(1));
        stale.times_updated = 4;
        stale.finalize();
        scheduler.packages().upsert("fresh", &fresh).await.unwrap();
        scheduler.packages().upsert("stale", &stale).await.unwrap();

        let report = scheduler.run_batch(&entries(&["fresh", "stale", "new"])).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.estimated, 2);
        assert_eq!(*scheduler.estimator().estimated.lock().unwrap(), ["stale", "new"]);

        let updated = scheduler.packages().find_one("stale").await.unwrap().unwrap();
        assert_eq!(updated.times_updated, 5);
        assert_eq!(updated.created, stale.created);
    }

    #[tokio::test]
    async fn run_pending_resumes_and_retries() {
        let now = Utc::now();
        let scheduler = scheduler(FakeEstimator::default(), SchedulerOptions::default());

        let big = PackageEntry::named("big");
        let partial = Estimation::new(&big, now, now);
        let continuation = Continuation::new("o", "big", 2, 3, IssueCounts::default());
        scheduler
            .pending()
            .upsert("big", &PendingRecord::deferred(&big, partial, continuation, now))
            .await
            .unwrap();
        scheduler
            .pending()
            .upsert("flaky", &PendingRecord::retry(&PackageEntry::named("flaky"), now))
            .await
            .unwrap();

        let report = scheduler.run_pending().await.unwrap();

        assert_eq!(report.resolved, 1);
        assert_eq!(report.estimated, 1);
        assert!(scheduler.pending().list().await.unwrap().is_empty());
        assert_eq!(scheduler.packages().list().await.unwrap().len(), 2);
        assert_eq!(*scheduler.estimator().resolved.lock().unwrap(), ["big"]);
    }

    #[tokio::test]
    async fn final_estimation_supersedes_older_pending_work() {
        let now = Utc::now();
        let then = now - chrono::TimeDelta::days(60);
        let scheduler = scheduler(FakeEstimator::default(), SchedulerOptions::default());

        let entry = PackageEntry::named("a");
        let stale = PendingRecord::deferred(&entry, Estimation::new(&entry, then, then), Continuation::new("o", "a", 2, 3, IssueCounts::default()), then);
        scheduler.pending().upsert("a", &stale).await.unwrap();

        let report = scheduler.run_batch(&entries(&["a"])).await.unwrap();
        assert_eq!(report.estimated, 1);
        assert!(scheduler.pending().list().await.unwrap().is_empty());

        let report = scheduler.run_pending().await.unwrap();
        assert_eq!(report.resolved, 0);
        assert!(scheduler.estimator().resolved.lock().unwrap().is_empty());

        let stored = scheduler.packages().find_one("a").await.unwrap().unwrap();
        assert!(stored.last_updated >= now);
        assert!(stored.factors.downloads.is_some());
        assert_eq!(stored.times_updated, 0);
    }

    #[tokio::test]
    async fn quota_failure_keeps_continuation_intact() {
        let now = Utc::now();
        let estimator = FakeEstimator {
            resolve_error: Some(EstimateError::QuotaExhausted(RateBudget::new(0, now))),
            ..FakeEstimator::default()
        };
        let scheduler = scheduler(estimator, SchedulerOptions::default());

        let big = PackageEntry::named("big");
        let record = PendingRecord::deferred(&big, Estimation::new(&big, now, now), Continuation::new("o", "big", 2, 3, IssueCounts::default()), now);
        scheduler.pending().upsert("big", &record).await.unwrap();

        let report = scheduler.run_pending().await.unwrap();

        assert_eq!(report.quota_exhausted, 1);
        assert_eq!(report.resolved, 0);
        assert_eq!(scheduler.pending().find_one("big").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn unreachable_store_aborts_the_batch() {
        let scheduler = BatchScheduler::new(FakeEstimator::default(), BrokenCollection, BrokenCollection, SchedulerOptions::default());

        let _ = scheduler.run_batch(&entries(&["a", "b"])).await.unwrap_err();
        let _ = scheduler.run_pending().await.unwrap_err();
    }

    #[test]
    fn report_absorbs_counters() {
        let mut report = BatchReport {
            estimated: 1,
            waited: Duration::from_secs(1),
            ..BatchReport::default()
        };
        report.absorb(&BatchReport {
            estimated: 2,
            resolved: 1,
            waited: Duration::from_secs(2),
            ..BatchReport::default()
        });

        assert_eq!(report.estimated, 3);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.waited, Duration::from_secs(3));
    }
}
