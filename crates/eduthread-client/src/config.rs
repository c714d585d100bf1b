//! Client configuration.
//!
//! Every field has a default so a partial configuration deserializes.

use std::time::Duration;

use eduthread_core::{ViewConfig, DEFAULT_PAGE_SIZE};
use serde::Deserialize;

/// Configuration for the REST client, the push hub and the thread view.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server origin (e.g., "http://localhost:5000").
    #[serde(default = "ClientConfig::default_base_url")]
    pub base_url: String,

    /// Path prefix of the REST API.
    #[serde(default = "ClientConfig::default_api_prefix")]
    pub api_prefix: String,

    /// Path of the push hub.
    #[serde(default = "ClientConfig::default_hub_path")]
    pub hub_path: String,

    /// Messages per history page.
    #[serde(default = "ClientConfig::default_page_size")]
    pub page_size: usize,

    /// REST request timeout in seconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Connect timeout in seconds, for REST and the hub.
    #[serde(default = "ClientConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Delays before each hub reconnect attempt, in milliseconds.
    #[serde(default = "ClientConfig::default_reconnect_delays")]
    pub reconnect_delays_ms: Vec<u64>,

    /// Scroll and paging thresholds of the thread view.
    #[serde(default)]
    pub view: ViewConfig,
}

impl ClientConfig {
    fn default_base_url() -> String {
        "http://localhost:5000".to_string()
    }

    fn default_api_prefix() -> String {
        "/api".to_string()
    }

    fn default_hub_path() -> String {
        "/hubs/chat".to_string()
    }

    const fn default_page_size() -> usize {
        DEFAULT_PAGE_SIZE
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_connect_timeout() -> u64 {
        5
    }

    fn default_reconnect_delays() -> Vec<u64> {
        vec![0, 2_000, 10_000, 30_000]
    }

    /// Create a configuration for `base_url` with defaults elsewhere.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Base URL of the REST API.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}{}", self.origin(), normalize_path(&self.api_prefix))
    }

    /// WebSocket URL of the push hub.
    #[must_use]
    pub fn hub_url(&self) -> String {
        let origin = self.origin();
        let ws_origin = if let Some(rest) = origin.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = origin.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            origin.to_string()
        };
        format!("{ws_origin}{}", normalize_path(&self.hub_path))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Get the connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Reconnect schedule as `Duration`s.
    #[must_use]
    pub fn reconnect_delays(&self) -> Vec<Duration> {
        self.reconnect_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

/// Ensure a leading slash and no trailing slash. Empty stays empty.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_prefix: Self::default_api_prefix(),
            hub_path: Self::default_hub_path(),
            page_size: Self::default_page_size(),
            request_timeout_seconds: Self::default_request_timeout(),
            connect_timeout_seconds: Self::default_connect_timeout(),
            reconnect_delays_ms: Self::default_reconnect_delays(),
            view: ViewConfig::default(),
        }
    }
}
