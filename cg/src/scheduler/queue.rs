//! Queue types for the scheduler

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::debug;

use crate::api::{ApiError, ApiResponse};

use super::quota::{QuotaState, WindowState};

/// Result delivered to the caller of `enqueue`
pub type RequestResult = Result<ApiResponse, ApiError>;

/// Re-invocable thunk that performs one HTTP call
pub(crate) type ExecuteFn = Box<dyn FnMut() -> BoxFuture<'static, RequestResult> + Send>;

/// One caller's pending request
///
/// Owned by the queue until it is settled. A throttled entry goes back to the
/// front of the queue as the same value, so the caller keeps waiting on the
/// same reply channel.
pub(crate) struct QueueEntry {
    pub request_id: String,
    pub execute: ExecuteFn,
    pub reply: oneshot::Sender<RequestResult>,
    pub throttled_attempts: u32,
    pub enqueued_at_ms: u64,
}

impl QueueEntry {
    /// Deliver the final result; consumes the entry so it settles once
    pub fn settle(self, result: RequestResult) {
        let request_id = self.request_id;
        if self.reply.send(result).is_err() {
            debug!(%request_id, "QueueEntry::settle: caller dropped the request");
        }
    }
}

/// Drain loop state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerState {
    /// Queue empty, waiting for work
    #[default]
    Idle,
    /// Dequeuing and executing requests
    Draining,
    /// Server quota exhausted, sleeping until its reset time
    WaitingForQuota,
    /// Local window full, sleeping until the window boundary
    WaitingForWindow,
    /// Backing off after a 429
    WaitingForRetry,
}

/// Counters for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_rate_limited: u64,
    pub total_quota_waits: u64,
    pub total_window_waits: u64,
    pub peak_queue_depth: usize,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub state: SchedulerState,
    pub queued: usize,
    pub quota: QuotaState,
    pub window: WindowState,
    pub stats: SchedulerStats,
}

impl QueueState {
    /// True when nothing is queued or in flight
    pub fn is_idle(&self) -> bool {
        self.state == SchedulerState::Idle && self.queued == 0
    }
}
