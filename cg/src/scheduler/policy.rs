//! Backoff policy for throttled (HTTP 429) requests

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Decision returned by the rate-limit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Put the request back at the head of the queue and wait this long
    Retry(Duration),
    /// Stop retrying and hand the 429 to the caller
    GiveUp,
}

/// How the scheduler reacts to a 429
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Wait used when the server sent no usable Retry-After
    pub default_retry_after: Duration,
    /// Maximum retries per request; `None` retries indefinitely
    pub max_retries: Option<u32>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_retry_after: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl RateLimitPolicy {
    /// Decide what to do after a request has been throttled
    ///
    /// `throttled_attempts` counts the 429s this request has received so far,
    /// including the one being handled.
    pub fn decide(&self, throttled_attempts: u32, retry_after: Option<Duration>) -> RateLimitDecision {
        if let Some(max) = self.max_retries
            && throttled_attempts > max
        {
            return RateLimitDecision::GiveUp;
        }
        RateLimitDecision::Retry(retry_after.unwrap_or(self.default_retry_after))
    }
}

/// Read `Retry-After` as a whole number of seconds
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_uses_server_value() {
        let policy = RateLimitPolicy::default();
        assert_eq!(
            policy.decide(1, Some(Duration::from_secs(5))),
            RateLimitDecision::Retry(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_retry_falls_back_to_default() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.decide(1, None), RateLimitDecision::Retry(Duration::from_secs(60)));
    }

    #[test]
    fn test_unbounded_by_default() {
        let policy = RateLimitPolicy::default();
        assert!(matches!(policy.decide(10_000, None), RateLimitDecision::Retry(_)));
    }

    #[test]
    fn test_respects_max_retries() {
        let policy = RateLimitPolicy {
            max_retries: Some(2),
            ..Default::default()
        };
        assert!(matches!(policy.decide(1, None), RateLimitDecision::Retry(_)));
        assert!(matches!(policy.decide(2, None), RateLimitDecision::Retry(_)));
        assert_eq!(policy.decide(3, None), RateLimitDecision::GiveUp);

        let never = RateLimitPolicy {
            max_retries: Some(0),
            ..Default::default()
        };
        assert_eq!(never.decide(1, None), RateLimitDecision::GiveUp);
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
