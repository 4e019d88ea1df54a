//! Scheduler implementation

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiError, ApiResponse};

use super::clock::{Clock, TokioClock};
use super::config::SchedulerConfig;
use super::policy::{RateLimitDecision, RateLimitPolicy, parse_retry_after};
use super::queue::{QueueEntry, QueueState, RequestResult, SchedulerState, SchedulerStats};
use super::quota::{QuotaState, WindowState};

/// Handle to the shared request queue
///
/// Every outbound API call is submitted here. A single drain task executes
/// the queued calls one at a time, so the process never has more than one
/// request in flight. Handles are cheap to clone; the drain task exits once
/// every handle is dropped and the queue is empty.
#[derive(Clone)]
pub struct RequestScheduler {
    tx: mpsc::UnboundedSender<QueueEntry>,
    state_rx: watch::Receiver<QueueState>,
    /// Entries sent but not yet moved onto the queue by the drain task
    in_channel: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl RequestScheduler {
    /// Spawn a scheduler on the tokio timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: SchedulerConfig) -> Self {
        Self::spawn_with_clock(config, Arc::new(TokioClock::new()))
    }

    /// Spawn a scheduler with an explicit time source
    pub fn spawn_with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(?config, "RequestScheduler::spawn_with_clock: called");
        let (tx, rx) = mpsc::unbounded_channel();
        let in_channel = Arc::new(AtomicUsize::new(0));

        let quota = QuotaState::new(config.max_requests_per_window);
        let window = WindowState::new(config.max_requests_per_window, clock.now_ms());
        let (state_tx, state_rx) = watch::channel(QueueState {
            state: SchedulerState::Idle,
            queued: 0,
            quota,
            window,
            stats: SchedulerStats::default(),
        });

        let drain = DrainLoop {
            policy: config.rate_limit_policy(),
            config,
            clock: Arc::clone(&clock),
            rx,
            in_channel: Arc::clone(&in_channel),
            state_tx,
            queue: VecDeque::new(),
            quota,
            window,
            state: SchedulerState::Idle,
            stats: SchedulerStats::default(),
            closed: false,
        };
        tokio::spawn(drain.run());

        info!("RequestScheduler spawned");
        Self {
            tx,
            state_rx,
            in_channel,
            clock,
        }
    }

    /// Queue a request
    ///
    /// The entry joins the queue immediately, before the returned future is
    /// first polled. `execute` may run more than once when the server answers
    /// 429; the future resolves with the result of the final attempt.
    pub fn enqueue<F, Fut>(&self, mut execute: F) -> BoxFuture<'static, RequestResult>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = RequestResult> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let entry = QueueEntry {
            request_id: Uuid::now_v7().to_string(),
            execute: Box::new(move || execute().boxed()),
            reply: reply_tx,
            throttled_attempts: 0,
            enqueued_at_ms: self.clock.now_ms(),
        };
        debug!(request_id = %entry.request_id, "RequestScheduler::enqueue: called");

        self.in_channel.fetch_add(1, Ordering::SeqCst);
        let sent = self.tx.send(entry).is_ok();
        if !sent {
            self.in_channel.fetch_sub(1, Ordering::SeqCst);
        }
        async move {
            if !sent {
                return Err(ApiError::SchedulerClosed);
            }
            reply_rx.await.map_err(|_| ApiError::SchedulerClosed)?
        }
        .boxed()
    }

    /// Current queue state
    pub fn queue_state(&self) -> QueueState {
        self.state_rx.borrow().clone()
    }

    /// Last rate-limit snapshot reported by the server
    pub fn rate_limit_info(&self) -> QuotaState {
        self.state_rx.borrow().quota
    }

    /// Wait until the queue is empty and nothing is in flight
    ///
    /// Entries still in the channel count as queued, so a request enqueued
    /// just before this call is waited for.
    pub async fn wait_idle(&self) {
        let mut rx = self.state_rx.clone();
        let in_channel = Arc::clone(&self.in_channel);
        // Err only when the drain task is gone, which also means idle
        let _ = rx
            .wait_for(|state| state.is_idle() && in_channel.load(Ordering::SeqCst) == 0)
            .await;
    }
}

/// How a finished attempt is handled
enum Outcome {
    Success(ApiResponse),
    Throttled(ApiError),
    Failed(ApiError),
}

fn classify(result: RequestResult) -> Outcome {
    match result {
        Ok(response) if response.is_rate_limited() => Outcome::Throttled(ApiError::RateLimited {
            retry_after: parse_retry_after(&response.headers),
        }),
        Ok(response) => Outcome::Success(response),
        Err(e) if e.is_rate_limit() => Outcome::Throttled(e),
        Err(e) => Outcome::Failed(e),
    }
}

/// The single task that owns the queue and all rate-limit state
struct DrainLoop {
    config: SchedulerConfig,
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    rx: mpsc::UnboundedReceiver<QueueEntry>,
    in_channel: Arc<AtomicUsize>,
    state_tx: watch::Sender<QueueState>,
    queue: VecDeque<QueueEntry>,
    quota: QuotaState,
    window: WindowState,
    state: SchedulerState,
    stats: SchedulerStats,
    closed: bool,
}

impl DrainLoop {
    async fn run(mut self) {
        debug!("DrainLoop::run: started");
        loop {
            self.collect_pending();

            if self.queue.is_empty() {
                self.transition(SchedulerState::Idle);
                if self.closed {
                    break;
                }
                match self.rx.recv().await {
                    Some(entry) => self.push_back(entry),
                    None => break,
                }
                continue;
            }

            self.transition(SchedulerState::Draining);
            self.step().await;
        }
        debug!("DrainLoop::run: all handles dropped, exiting");
    }

    /// Move everything waiting in the channel onto the queue, in arrival order
    fn collect_pending(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(entry) => self.push_back(entry),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn push_back(&mut self, entry: QueueEntry) {
        debug!(request_id = %entry.request_id, "DrainLoop::push_back: queued");
        self.queue.push_back(entry);
        self.stats.total_enqueued += 1;
        self.stats.peak_queue_depth = self.stats.peak_queue_depth.max(self.queue.len());
        // Publish first: a waiter must see either the queued entry or the channel count
        self.publish();
        self.in_channel.fetch_sub(1, Ordering::SeqCst);
    }

    /// Run one admission decision: wait, or execute the head of the queue
    async fn step(&mut self) {
        let now = self.clock.now_ms();

        if let Some(wait) = self.quota.wait_for_reset(now) {
            let wait = wait + self.config.reset_buffer();
            info!(wait_ms = wait.as_millis() as u64, "Server quota exhausted, waiting for reset");
            self.stats.total_quota_waits += 1;
            self.transition(SchedulerState::WaitingForQuota);
            self.clock.sleep(wait).await;
            self.window.clear_count();
            return;
        }

        if self.window.roll_if_elapsed(now, self.config.window()) {
            debug!("DrainLoop::step: window elapsed, counter reset");
        }

        if self.window.is_full() {
            let wait = self.window.time_until_boundary(now, self.config.window()) + self.config.reset_buffer();
            info!(
                wait_ms = wait.as_millis() as u64,
                max = self.window.max_requests_per_window,
                "Local request window full, waiting for next window"
            );
            self.stats.total_window_waits += 1;
            self.transition(SchedulerState::WaitingForWindow);
            self.clock.sleep(wait).await;
            self.window.restart(self.clock.now_ms());
            return;
        }

        let Some(mut entry) = self.queue.pop_front() else {
            return;
        };
        self.window.record_request();
        self.publish();

        debug!(
            request_id = %entry.request_id,
            queued_ms = now.saturating_sub(entry.enqueued_at_ms),
            in_window = self.window.requests_in_window,
            "DrainLoop::step: executing"
        );
        let result = (entry.execute)().await;

        match classify(result) {
            Outcome::Success(response) => {
                if let Some(limit) = self.quota.observe(&response.headers) {
                    self.window.adopt_limit(limit);
                }
                debug!(
                    request_id = %entry.request_id,
                    status = response.status,
                    limit = self.quota.limit,
                    remaining = self.quota.remaining,
                    "DrainLoop::step: success"
                );
                self.stats.total_completed += 1;
                self.publish();
                entry.settle(Ok(response));
            }
            Outcome::Throttled(err) => {
                self.window.refund_request();
                self.stats.total_rate_limited += 1;
                entry.throttled_attempts += 1;

                match self.policy.decide(entry.throttled_attempts, err.retry_after()) {
                    RateLimitDecision::Retry(delay) => {
                        warn!(
                            request_id = %entry.request_id,
                            attempt = entry.throttled_attempts,
                            retry_after_secs = delay.as_secs(),
                            "API rate limit exceeded, retrying at head of queue"
                        );
                        self.queue.push_front(entry);
                        self.transition(SchedulerState::WaitingForRetry);
                        self.clock.sleep(delay).await;
                        return;
                    }
                    RateLimitDecision::GiveUp => {
                        warn!(
                            request_id = %entry.request_id,
                            attempts = entry.throttled_attempts,
                            "API rate limit retries exhausted"
                        );
                        self.stats.total_failed += 1;
                        self.publish();
                        entry.settle(Err(err));
                    }
                }
            }
            Outcome::Failed(err) => {
                debug!(request_id = %entry.request_id, error = %err, "DrainLoop::step: failed");
                self.stats.total_failed += 1;
                self.publish();
                entry.settle(Err(err));
            }
        }

        self.collect_pending();
        if !self.queue.is_empty() {
            self.clock.sleep(self.config.pacing_delay()).await;
        }
    }

    fn transition(&mut self, next: SchedulerState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "DrainLoop::transition");
            self.state = next;
        }
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(QueueState {
            state: self.state,
            queued: self.queue.len(),
            quota: self.quota,
            window: self.window,
            stats: self.stats.clone(),
        });
    }
}
