//! Raw HTTP response as seen by the scheduler

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use super::ApiError;

/// Status, headers and body of one completed HTTP call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, headers: HeaderMap, body: String) -> Self {
        Self { status, headers, body }
    }

    /// Read a reqwest response to completion
    pub async fn read(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(Self { status, headers, body })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Parse the body as JSON
    ///
    /// An empty body (e.g. 204) parses as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = if self.body.trim().is_empty() { "null" } else { &self.body };
        Ok(serde_json::from_str(body)?)
    }

    /// Turn a non-2xx response into the matching error
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status, &self.headers, self.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body() {
        let response = ApiResponse::new(200, HeaderMap::new(), r#"{"id": 7}"#.to_string());
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn test_empty_body_is_null() {
        let response = ApiResponse::new(204, HeaderMap::new(), String::new());
        let value: serde_json::Value = response.json().unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_error_for_status() {
        let ok = ApiResponse::new(201, HeaderMap::new(), "{}".to_string());
        assert!(ok.error_for_status().is_ok());

        let throttled = ApiResponse::new(429, HeaderMap::new(), String::new());
        assert!(throttled.is_rate_limited());
        assert!(throttled.error_for_status().unwrap_err().is_rate_limit());

        let failed = ApiResponse::new(500, HeaderMap::new(), "boom".to_string());
        match failed.error_for_status() {
            Err(ApiError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
