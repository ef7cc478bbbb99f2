//! Time source for rate-limit cooldowns and retry backoff
//!
//! The page loop never sleeps directly; it goes through a [`Clock`] so the
//! cooldown protocol can be tested without waiting in real time.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Clock used for waiting
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);

    /// Suspend until `deadline`; returns immediately if it has passed
    async fn sleep_until(&self, deadline: Instant) {
        let now = self.now();
        if deadline > now {
            self.sleep(deadline - now).await;
        }
    }
}

/// Wall clock backed by tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        sleep(duration).await;
    }
}

/// Virtual clock that advances only when slept on.
///
/// Every sleep is recorded, which lets callers assert on the exact waits a
/// run performed.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Create a clock at an arbitrary origin
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        *lock(&self.elapsed) += duration;
    }

    /// Total virtual time elapsed
    pub fn elapsed(&self) -> Duration {
        *lock(&self.elapsed)
    }

    /// Every sleep performed, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *lock(&self.elapsed)
    }

    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        *lock(&self.elapsed) += duration;
    }
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

// A poisoned lock only means a panicking test thread; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
