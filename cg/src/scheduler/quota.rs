//! Server quota and local window bookkeeping

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::debug;

pub const RATELIMIT_TOTAL: &str = "x-ratelimit-total";
pub const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Last rate-limit snapshot reported by the server
///
/// `remaining` only ever changes on a fresh header reading; the scheduler
/// never bumps it locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaState {
    /// `X-Ratelimit-Total`
    pub limit: u32,
    /// `X-Ratelimit-Remaining`
    pub remaining: u32,
    /// `X-Ratelimit-Reset`, Unix seconds
    pub reset_at: Option<u64>,
}

impl QuotaState {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
            reset_at: None,
        }
    }

    /// Fold rate-limit headers into the snapshot
    ///
    /// Missing or unparseable headers leave the matching field untouched. A
    /// negative `X-Ratelimit-Remaining` counts as exhausted. Returns the
    /// advertised limit when `X-Ratelimit-Total` was readable.
    pub fn observe(&mut self, headers: &HeaderMap) -> Option<u32> {
        let limit = header_number(headers, RATELIMIT_TOTAL).and_then(|v| u32::try_from(v).ok());
        let remaining =
            header_number(headers, RATELIMIT_REMAINING).map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX));
        let reset_at = header_number(headers, RATELIMIT_RESET).and_then(|v| u64::try_from(v).ok());

        if let Some(limit) = limit {
            self.limit = limit;
        }
        if let Some(remaining) = remaining {
            self.remaining = remaining;
        }
        if let Some(reset_at) = reset_at {
            self.reset_at = Some(reset_at);
        }

        debug!(?limit, ?remaining, ?reset_at, "QuotaState::observe: headers read");
        limit
    }

    /// Reset time in Unix milliseconds
    pub fn reset_at_ms(&self) -> Option<u64> {
        self.reset_at.map(|secs| secs.saturating_mul(1000))
    }

    /// Time left until the server quota refills, if it is exhausted
    ///
    /// `None` when requests remain, when no reset time is known, or when the
    /// reset time has already passed.
    pub fn wait_for_reset(&self, now_ms: u64) -> Option<Duration> {
        if self.remaining > 0 {
            return None;
        }
        let reset_ms = self.reset_at_ms()?;
        (reset_ms > now_ms).then(|| Duration::from_millis(reset_ms - now_ms))
    }
}

impl Default for QuotaState {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Local fallback admission counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowState {
    pub requests_in_window: u32,
    pub window_start_ms: u64,
    pub max_requests_per_window: u32,
}

impl WindowState {
    pub fn new(max_requests_per_window: u32, now_ms: u64) -> Self {
        Self {
            requests_in_window: 0,
            window_start_ms: now_ms,
            max_requests_per_window: max_requests_per_window.max(1),
        }
    }

    /// Restart the window if it has run its full length
    pub fn roll_if_elapsed(&mut self, now_ms: u64, window: Duration) -> bool {
        if now_ms.saturating_sub(self.window_start_ms) >= window.as_millis() as u64 {
            self.restart(now_ms);
            return true;
        }
        false
    }

    pub fn restart(&mut self, now_ms: u64) {
        self.requests_in_window = 0;
        self.window_start_ms = now_ms;
    }

    pub fn clear_count(&mut self) {
        self.requests_in_window = 0;
    }

    pub fn is_full(&self) -> bool {
        self.requests_in_window >= self.max_requests_per_window
    }

    /// Time until the current window ends
    pub fn time_until_boundary(&self, now_ms: u64, window: Duration) -> Duration {
        let elapsed = Duration::from_millis(now_ms.saturating_sub(self.window_start_ms));
        window.saturating_sub(elapsed)
    }

    pub fn record_request(&mut self) {
        self.requests_in_window = self.requests_in_window.saturating_add(1);
    }

    /// Give back a slot taken by an attempt the server throttled
    pub fn refund_request(&mut self) {
        self.requests_in_window = self.requests_in_window.saturating_sub(1);
    }

    /// Adopt the server's advertised limit; zero is clamped to one
    pub fn adopt_limit(&mut self, limit: u32) {
        self.max_requests_per_window = limit.max(1);
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
