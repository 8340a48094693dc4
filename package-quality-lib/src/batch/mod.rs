//! Batch estimation over a worklist
//!
//! The [`BatchScheduler`] splits the worklist into sequential chunks and estimates the
//! packages of a chunk concurrently. Between chunks it compares the tightest issue
//! tracker budget observed in the chunk against the chunk size and sleeps until the
//! quota resets when the budget cannot cover the next chunk.
//!
//! Results go to two keyed [`Collection`]s: finished [`Estimation`](crate::estimation::Estimation)s
//! and [`PendingRecord`]s for deferred or failed work. The [`update_policy`] decides
//! which stored packages are due and carries bookkeeping from one estimation to the next.

mod pending;
mod scheduler;
mod store;
pub mod update_policy;
mod worklist;

pub use pending::PendingRecord;
pub use scheduler::{BatchReport, BatchScheduler, Clock, DEFAULT_STORE_TIMEOUT, SchedulerOptions};
pub use store::{Collection, FileCollection, MemoryCollection};
pub use worklist::{load_worklist, parse_worklist};
