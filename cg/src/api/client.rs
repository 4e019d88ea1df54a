//! Freshservice REST client
//!
//! Every call goes through the shared [`RequestScheduler`], so the verb
//! helpers only bind a method and URL to an executor and enqueue it.

use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::types::{Group, User, parse_list};
use super::{ApiError, ApiResponse};
use crate::change::ChangeRequest;
use crate::config::ApiConfig;
use crate::scheduler::{QuotaState, RequestResult, RequestScheduler};
use crate::search::{UserKind, search_path};

/// Placeholder host shipped in sample configuration
pub const PLACEHOLDER_HOST: &str = "example.freshservice.com";

pub const AGENTS_PATH: &str = "/api/v2/agents";
pub const REQUESTERS_PATH: &str = "/api/v2/requesters";
pub const GROUPS_PATH: &str = "/api/v2/groups";
pub const CHANGES_PATH: &str = "/api/v2/changes";

/// Freshservice API client
#[derive(Clone)]
pub struct FreshserviceClient {
    base_url: String,
    api_key: String,
    http: Client,
    scheduler: RequestScheduler,
}

impl FreshserviceClient {
    /// Create a client from the `api` config section
    pub fn from_config(config: &ApiConfig, scheduler: RequestScheduler) -> Result<Self, ApiError> {
        debug!(url = ?config.url, timeout_ms = config.timeout_ms, "from_config: called");
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| ApiError::NotConfigured("API URL is not set".to_string()))?;
        let api_key = config
            .key
            .clone()
            .ok_or_else(|| ApiError::NotConfigured("API key is not set".to_string()))?;
        Self::new(base_url, api_key, Duration::from_millis(config.timeout_ms), scheduler)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        scheduler: RequestScheduler,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let api_key = api_key.into();

        if base_url.trim().is_empty() {
            return Err(ApiError::NotConfigured("API URL is not set".to_string()));
        }
        if base_url.contains(PLACEHOLDER_HOST) {
            return Err(ApiError::NotConfigured(format!(
                "API URL still points at the placeholder {}",
                PLACEHOLDER_HOST
            )));
        }
        if api_key.trim().is_empty() {
            return Err(ApiError::NotConfigured("API key is not set".to_string()));
        }

        let http = Client::builder().timeout(timeout).build().map_err(ApiError::Network)?;
        info!(%base_url, "Freshservice client ready");

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
            scheduler,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scheduler(&self) -> &RequestScheduler {
        &self.scheduler
    }

    /// Join a relative API path to the base URL; absolute URLs pass through
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Enqueue one call; the entry joins the queue before this returns
    pub fn request(&self, method: Method, path: &str, body: Option<Value>) -> BoxFuture<'static, RequestResult> {
        let url = self.resolve_url(path);
        debug!(%method, %url, "FreshserviceClient::request: called");

        let http = self.http.clone();
        let api_key = self.api_key.clone();
        self.scheduler.enqueue(move || {
            let mut builder = http
                .request(method.clone(), &url)
                .basic_auth(&api_key, Some("X"))
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json");
            if let Some(body) = &body {
                builder = builder.json(body);
            }
            async move {
                let response = builder.send().await?;
                ApiResponse::read(response).await?.error_for_status()
            }
        })
    }

    pub fn get(&self, path: &str) -> BoxFuture<'static, RequestResult> {
        self.request(Method::GET, path, None)
    }

    pub fn post<B: Serialize>(&self, path: &str, body: &B) -> BoxFuture<'static, RequestResult> {
        match serde_json::to_value(body) {
            Ok(body) => self.request(Method::POST, path, Some(body)),
            Err(e) => futures::future::ready(Err(e.into())).boxed(),
        }
    }

    pub fn put<B: Serialize>(&self, path: &str, body: &B) -> BoxFuture<'static, RequestResult> {
        match serde_json::to_value(body) {
            Ok(body) => self.request(Method::PUT, path, Some(body)),
            Err(e) => futures::future::ready(Err(e.into())).boxed(),
        }
    }

    pub fn delete(&self, path: &str) -> BoxFuture<'static, RequestResult> {
        self.request(Method::DELETE, path, None)
    }

    /// Search agents or requesters
    pub async fn search_users(&self, kind: UserKind, term: &str) -> Result<Vec<User>, ApiError> {
        debug!(%kind, %term, "search_users: called");
        let path = search_path(kind, term)?;
        let response = self.get(&path).await?;
        let users: Vec<User> = parse_list(&response.body, kind.collection())?;
        info!(%kind, count = users.len(), "Search complete");
        Ok(users)
    }

    /// List agent groups
    pub async fn list_groups(&self) -> Result<Vec<Group>, ApiError> {
        debug!("list_groups: called");
        let response = self.get(GROUPS_PATH).await?;
        parse_list(&response.body, "groups")
    }

    /// Verify the URL and key with a minimal request
    ///
    /// Returns the quota reported by the server.
    pub async fn test_credentials(&self) -> Result<QuotaState, ApiError> {
        debug!("test_credentials: called");
        self.get(&format!("{}?per_page=1", AGENTS_PATH)).await?;
        Ok(self.scheduler.rate_limit_info())
    }

    /// Submit a validated change request
    pub async fn submit_change(&self, change: &ChangeRequest) -> Result<Value, ApiError> {
        debug!(subject = %change.subject, "submit_change: called");
        let response = self.post(CHANGES_PATH, change).await?;
        let created: Value = response.json()?;
        info!(subject = %change.subject, "Change request submitted");
        Ok(created)
    }
}
