//! changegate configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::PLACEHOLDER_HOST;
use crate::scheduler::SchedulerConfig;

pub const ENV_API_URL: &str = "FRESHSERVICE_API_URL";
pub const ENV_API_KEY: &str = "FRESHSERVICE_API_KEY";

/// Main changegate configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Freshservice connection
    pub api: ApiConfig,

    /// Request queue and rate limiting
    pub scheduler: SchedulerConfig,

    /// Change type labels offered by `cg change`; empty means the built-in four
    #[serde(rename = "change-types", skip_serializing_if = "Vec::is_empty")]
    pub change_types: Vec<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// The API URL must be set, parse as a URL and not be the sample
    /// placeholder; the API key must be non-empty.
    pub fn validate(&self) -> Result<()> {
        let url = self
            .api
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("Freshservice API URL not set. Run `cg configure` or set {}.", ENV_API_URL))?;

        reqwest::Url::parse(url).context(format!("Invalid Freshservice API URL: {}", url))?;

        if url.contains(PLACEHOLDER_HOST) {
            return Err(eyre::eyre!(
                "Freshservice API URL still points at {}. Set your own domain.",
                PLACEHOLDER_HOST
            ));
        }

        if self.api.key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(eyre::eyre!(
                "Freshservice API key not set. Run `cg configure` or set {}.",
                ENV_API_KEY
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_with(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .changegate.yml
        let local_config = PathBuf::from(".changegate.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/changegate/changegate.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let mut config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.api.url = config.api.url.as_deref().map(format_api_url);

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Path of the persisted user config
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("changegate").join("changegate.yml"))
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("apply_env_with: API URL from environment");
            self.api.url = Some(format_api_url(&url));
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("apply_env_with: API key from environment");
            self.api.key = Some(key);
        }
    }

    /// Apply command-line overrides, which take precedence over everything else
    pub fn apply_overrides(&mut self, api_url: Option<&str>, api_key: Option<&str>) {
        if let Some(url) = api_url {
            self.api.url = Some(format_api_url(url));
        }
        if let Some(key) = api_key {
            self.api.key = Some(key.to_string());
        }
    }

    /// Write the config as YAML, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, yaml).context(format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Persist to the user config file; returns where it was written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::user_config_path().ok_or_else(|| eyre::eyre!("Could not determine config directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Remove a saved config file; returns whether one existed
    pub fn reset_at(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).context(format!("Failed to remove {}", path.display()))?;
        tracing::info!("Removed config: {}", path.display());
        Ok(true)
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.api.key = copy.api.key.as_deref().map(mask_key);
        copy
    }
}

/// Freshservice connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Helpdesk URL, e.g. https://acme.freshservice.com
    pub url: Option<String>,

    /// API key, sent as the basic auth user name
    pub key: Option<String>,

    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            timeout_ms: 30_000,
        }
    }
}

/// Normalize a user-entered URL: trim, default to https, drop the trailing slash
pub fn format_api_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    format!("****{}", key.chars().skip(count - 4).collect::<String>())
}
