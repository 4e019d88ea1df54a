//! Freshservice API module
//!
//! HTTP client, error taxonomy, and the one place where list responses are
//! normalized into typed resources.

mod client;
mod error;
mod response;
mod types;

pub use client::{AGENTS_PATH, CHANGES_PATH, FreshserviceClient, GROUPS_PATH, PLACEHOLDER_HOST, REQUESTERS_PATH};
pub use error::ApiError;
pub use response::ApiResponse;
pub use types::{Group, User, parse_list};
