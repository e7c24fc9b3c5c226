//! Concurrency limiter for tile downloads.
//!
//! A semaphore with in-flight and peak counters. Permits are owned so they
//! can move into spawned download tasks; the slot is released when the
//! permit drops, however the task ends.
//!
//! ```ignore
//! let limiter = ConcurrencyLimiter::new(6, "tile-download");
//! if let Some(permit) = limiter.try_acquire() {
//!     tasks.spawn(async move {
//!         let _permit = permit;
//!         // download happens here
//!     });
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent downloads.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

/// Upper bound accepted for concurrent downloads.
pub const MAX_CONCURRENT_CEILING: usize = 64;

/// Bounds the number of concurrent operations.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,

    /// Maximum permits (for stats/debugging)
    max_permits: usize,

    /// Operations currently holding a permit
    in_flight: Arc<AtomicUsize>,

    /// Highest `in_flight` observed
    peak_in_flight: AtomicUsize,

    label: String,
}

impl ConcurrencyLimiter {
    /// Creates a limiter. `max_concurrent` is clamped to `1..=64`.
    pub fn new(max_concurrent: usize, label: impl Into<String>) -> Self {
        let max_permits = max_concurrent.clamp(1, MAX_CONCURRENT_CEILING);
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
            label: label.into(),
        }
    }

    /// Waits for a permit. Returns `None` once the limiter is closed.
    pub async fn acquire(&self) -> Option<ConcurrencyPermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        Some(self.track(permit))
    }

    /// Takes a permit if one is free right now.
    pub fn try_acquire(&self) -> Option<ConcurrencyPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> ConcurrencyPermit {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);
        ConcurrencyPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Stops handing out permits. Held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn reset_peak(&self) {
        self.peak_in_flight.store(0, Ordering::Relaxed);
    }
}

/// A held download slot, released on drop.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_limiter() {
        let limiter = ConcurrencyLimiter::new(6, "test");
        assert_eq!(limiter.max_concurrent(), 6);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available_permits(), 6);
        assert_eq!(limiter.label(), "test");
    }

    #[test]
    fn test_limits_are_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0, "zero").max_concurrent(), 1);
        assert_eq!(
            ConcurrencyLimiter::new(1000, "huge").max_concurrent(),
            MAX_CONCURRENT_CEILING
        );
    }

    #[tokio::test]
    async fn test_acquire_releases_on_drop() {
        let limiter = ConcurrencyLimiter::new(2, "test");

        {
            let _permit1 = limiter.acquire().await.unwrap();
            assert_eq!(limiter.available_permits(), 1);

            {
                let _permit2 = limiter.acquire().await.unwrap();
                assert_eq!(limiter.available_permits(), 0);
                assert_eq!(limiter.in_flight(), 2);
            }

            assert_eq!(limiter.in_flight(), 1);
        }

        assert_eq!(limiter.available_permits(), 2);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_try_acquire() {
        let limiter = ConcurrencyLimiter::new(1, "test");

        let permit1 = limiter.try_acquire();
        assert!(permit1.is_some());
        assert!(limiter.try_acquire().is_none());

        drop(permit1);
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_peak_tracking() {
        let limiter = ConcurrencyLimiter::new(10, "test");

        let p1 = limiter.acquire().await.unwrap();
        let p2 = limiter.acquire().await.unwrap();
        let p3 = limiter.acquire().await.unwrap();
        assert_eq!(limiter.peak_in_flight(), 3);

        drop(p3);
        drop(p2);
        assert_eq!(limiter.peak_in_flight(), 3);
        assert_eq!(limiter.in_flight(), 1);

        limiter.reset_peak();
        assert_eq!(limiter.peak_in_flight(), 0);
        drop(p1);
    }

    #[tokio::test]
    async fn test_permit_moves_into_task() {
        let limiter = Arc::new(ConcurrencyLimiter::new(3, "test"));
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..12 {
            let permit = limiter.acquire().await.unwrap();
            let observed = Arc::clone(&limiter);
            tasks.spawn(async move {
                let _permit = permit;
                tokio::time::sleep(Duration::from_millis(5)).await;
                observed.in_flight()
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap() <= 3);
        }
        assert_eq!(limiter.in_flight(), 0);
        assert!(limiter.peak_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_closed_limiter_refuses_permits() {
        let limiter = ConcurrencyLimiter::new(2, "test");
        limiter.close();
        assert!(limiter.acquire().await.is_none());
        assert!(limiter.try_acquire().is_none());
    }
}
