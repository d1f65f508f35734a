use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Monotonic time source for retry deadlines and delays between attempts.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Real time backed by the Tokio timer.
#[derive(Copy, Clone, Debug, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub use self::fake::FakeClock;
