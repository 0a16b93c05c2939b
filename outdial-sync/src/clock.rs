//! Clock abstraction for all timing in the synchronization core.
//!
//! Every timer - poll backoff, idle check cadence, cache freshness - flows
//! through this trait so the same logic runs against a simulated clock in
//! tests. Sleeps are plain futures: dropping one (e.g. when a `select!`
//! takes the shutdown branch) cancels the timer with nothing left behind.

use async_trait::async_trait;
use outdial_core::Timestamp;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;

    /// Suspend the calling task for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by `chrono` and the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
