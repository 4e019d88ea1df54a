//! Request scheduler
//!
//! Serializes every outbound Freshservice call through one queue, keeps the
//! request rate under the server's advertised quota, and retries throttled
//! requests after the server-directed backoff.

mod clock;
mod config;
mod core;
mod policy;
mod queue;
mod quota;

pub use clock::{Clock, TokioClock};
pub use config::SchedulerConfig;
pub use core::RequestScheduler;
pub use policy::{RateLimitDecision, RateLimitPolicy, parse_retry_after};
pub use queue::{QueueState, RequestResult, SchedulerState, SchedulerStats};
pub use quota::{QuotaState, WindowState};
