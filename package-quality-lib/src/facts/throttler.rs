use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits concurrency of a page fan-out and short-circuits it once the quota runs dry.
///
/// Call [`Throttler::acquire`] before each request. At most `max_concurrent` requests
/// are in flight at a time. Once any request observes an exhausted quota it calls
/// [`Throttler::trip`], after which queued requests get `None` from `acquire` and must
/// not touch the network.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    tripped: AtomicBool,
}

impl Throttler {
    /// Create a new throttler that allows at most `max_concurrent` requests at a time.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tripped: AtomicBool::new(false),
        })
    }

    /// Wait for a concurrency slot, or return `None` if the quota has been exhausted.
    ///
    /// The returned permit must be held for the duration of the request.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if self.is_tripped() {
            return None;
        }

        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;

        // the quota may have run out while we were queued
        if self.is_tripped() {
            return None;
        }

        Some(permit)
    }

    /// Mark the quota as exhausted. Requests already in flight finish normally.
    pub fn trip(&self) {
        self.tripped.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;
    use core::time::Duration;

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn limits_concurrency() {
        let throttler = Throttler::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let throttler = Arc::clone(&throttler);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _permit = throttler.acquire().await;
                    let current = active.fetch_add(1, Ordering::SeqCst) + 1;
                    _ = max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    _ = active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        _ = futures_util::future::join_all(tasks).await;

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn tripped_throttler_refuses_new_work() {
        let throttler = Throttler::new(3);
        assert!(throttler.acquire().await.is_some());

        throttler.trip();

        assert!(throttler.is_tripped());
        assert!(throttler.acquire().await.is_none());
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn queued_request_sees_trip() {
        let throttler = Throttler::new(1);
        let held = throttler.acquire().await;
        assert!(held.is_some());

        let waiter = {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move { throttler.acquire().await.is_some() })
        };

        tokio::task::yield_now().await;
        throttler.trip();
        drop(held);

        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
    async fn zero_concurrency_is_clamped() {
        let throttler = Throttler::new(0);
        assert!(throttler.acquire().await.is_some());
    }
}
