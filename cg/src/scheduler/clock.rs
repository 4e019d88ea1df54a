//! Time source for the scheduler

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::time::Instant;

/// Wall-clock reading plus sleep
///
/// The scheduler never calls `SystemTime::now()` or `tokio::time::sleep`
/// directly; everything goes through this trait so tests can drive it on
/// virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time in Unix milliseconds
    fn now_ms(&self) -> u64;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
///
/// Wall-clock time is a Unix anchor plus the elapsed tokio `Instant`, so a
/// paused runtime (`#[tokio::test(start_paused = true)]`) advances `now_ms`
/// and sleeps together.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_unix_ms: u64,
    anchor: Instant,
}

impl TokioClock {
    /// Anchor at the current system time
    pub fn new() -> Self {
        let anchor_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::anchored_at(anchor_unix_ms)
    }

    /// Anchor at an explicit Unix millisecond timestamp
    pub fn anchored_at(anchor_unix_ms: u64) -> Self {
        Self {
            anchor_unix_ms,
            anchor: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.anchor_unix_ms + self.anchor.elapsed().as_millis() as u64
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
