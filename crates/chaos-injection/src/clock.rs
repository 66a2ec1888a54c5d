//! Time source seam

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt::Debug;
use std::time::Duration;

/// Wall clock plus timers
pub trait Clock: Debug + Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// Future resolving once `duration` has elapsed
    fn after(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Clock backed by the system time and tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn after_follows_tokio_time() {
        let clock = SystemClock;
        let start = tokio::time::Instant::now();
        clock.after(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
