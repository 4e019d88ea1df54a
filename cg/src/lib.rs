//! changegate - Freshservice change request helper
//!
//! Searches Freshservice agents and requesters, lists agent groups, scores a
//! change's risk and assembles the change request payload.
//!
//! # Core Concepts
//!
//! - **One Queue**: every API call goes through a single [`RequestScheduler`],
//!   so at most one request is in flight per process
//! - **Server-Driven Pacing**: `X-Ratelimit-*` headers set the pace; a local
//!   window covers the gap until the server reports its limit
//! - **Transparent Backoff**: 429 responses are retried at the head of the
//!   queue after `Retry-After`
//!
//! # Modules
//!
//! - [`scheduler`] - Request queue, quota tracking, retry policy
//! - [`api`] - Freshservice HTTP client and response types
//! - [`search`] - Agent/requester query construction
//! - [`risk`] - Risk questionnaire and scoring
//! - [`change`] - Change request validation and payload
//! - [`export`] - CSV export
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod api;
pub mod change;
pub mod cli;
pub mod config;
pub mod export;
pub mod prompt;
pub mod risk;
pub mod scheduler;
pub mod search;

// Re-export commonly used types
pub use api::{ApiError, ApiResponse, FreshserviceClient, Group, User};
pub use change::{ChangeDraft, ChangeError, ChangeRequest, ChangeType, Pick, Selection};
pub use config::{ApiConfig, Config};
pub use risk::{RiskAssessment, RiskLevel, RiskResult};
pub use scheduler::{Clock, QueueState, QuotaState, RequestScheduler, SchedulerConfig, SchedulerState, TokioClock};
pub use search::{SearchError, UserKind};
