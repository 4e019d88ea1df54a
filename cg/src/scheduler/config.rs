//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::policy::RateLimitPolicy;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Local counting window in milliseconds
    #[serde(rename = "window-ms", default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests allowed per window until the server advertises its own limit
    #[serde(rename = "max-requests-per-window", default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    /// Pause between two settled requests when more are queued
    #[serde(rename = "pacing-delay-ms", default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Extra wait added after a quota or window reset
    #[serde(rename = "reset-buffer-ms", default = "default_reset_buffer_ms")]
    pub reset_buffer_ms: u64,

    /// Backoff used for a 429 without a usable Retry-After header
    #[serde(rename = "default-retry-after-secs", default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,

    /// Cap on 429 retries per request; unset means retry forever
    #[serde(rename = "max-rate-limit-retries", default)]
    pub max_rate_limit_retries: Option<u32>,
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests_per_window() -> u32 {
    50
}

fn default_pacing_delay_ms() -> u64 {
    100
}

fn default_reset_buffer_ms() -> u64 {
    100
}

fn default_retry_after_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests_per_window: default_max_requests_per_window(),
            pacing_delay_ms: default_pacing_delay_ms(),
            reset_buffer_ms: default_reset_buffer_ms(),
            default_retry_after_secs: default_retry_after_secs(),
            max_rate_limit_retries: None,
        }
    }
}

impl SchedulerConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn reset_buffer(&self) -> Duration {
        Duration::from_millis(self.reset_buffer_ms)
    }

    /// Build the 429 retry policy from this configuration
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            default_retry_after: Duration::from_secs(self.default_retry_after_secs),
            max_retries: self.max_rate_limit_retries,
        }
    }
}
