//! API error types

use std::time::Duration;

use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::scheduler::parse_retry_after;
use crate::search::SearchError;

/// Errors that can occur while talking to Freshservice
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Request scheduler has shut down")]
    SchedulerClosed,
}

impl ApiError {
    /// Build the error for a non-2xx response
    pub fn from_status(status: u16, headers: &HeaderMap, body: String) -> Self {
        if status == 429 {
            return ApiError::RateLimited {
                retry_after: parse_retry_after(headers),
            };
        }
        ApiError::Status { status, message: body }
    }

    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-directed backoff for a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
