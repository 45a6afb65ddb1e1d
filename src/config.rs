//! Configuration management

use anyhow::{Context, Result};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

/// Default backend location
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Statistics poll period
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// AstraDNS API base URL
    pub api_url: Url,

    /// How often the dashboard refreshes statistics
    pub poll_interval: Duration,

    /// Client instance name. Each profile persists its own credential.
    pub profile: String,

    /// Where the credential is persisted
    pub credential_path: PathBuf,

    /// Drop the session when the backend answers 401/403
    pub logout_on_unauthorized: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let profile = "default".to_string();
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            credential_path: default_credential_path(&profile),
            profile,
            logout_on_unauthorized: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("ASTRADNS_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url)
            .with_context(|| format!("Invalid ASTRADNS_API_URL: {}", api_url))?;

        let poll_interval = std::env::var("ASTRADNS_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|ms: &u64| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));

        let profile = std::env::var("ASTRADNS_PROFILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "default".to_string());

        let credential_path = std::env::var("ASTRADNS_CREDENTIAL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_credential_path(&profile));

        let logout_on_unauthorized = std::env::var("ASTRADNS_LOGOUT_ON_UNAUTHORIZED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            api_url,
            poll_interval,
            profile,
            credential_path,
            logout_on_unauthorized,
        })
    }
}

fn default_credential_path(profile: &str) -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("astradns")
        .join(format!("{}.json", profile))
}
