//! Application configuration.
//!
//! Loaded from TOML. Every key is optional; missing keys take the defaults
//! below.

use crate::error::{AppError, AppResult};
use cockpit_api::ApiConfig;
use cockpit_chart::ChartLayout;
use cockpit_core::{FreshnessPolicy, SubscriptionSet};
use cockpit_ws::DEFAULT_CHANNELS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Pull path configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Keep polling push-covered fields while the push channel is connected.
    #[serde(default)]
    pub poll_push_fields_when_connected: bool,
    #[serde(default = "default_trades_limit")]
    pub trades_limit: usize,
    #[serde(default = "default_reasoning_limit")]
    pub reasoning_limit: usize,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_trades_limit() -> usize {
    50
}

fn default_reasoning_limit() -> usize {
    10
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            poll_push_fields_when_connected: false,
            trades_limit: default_trades_limit(),
            reasoning_limit: default_reasoning_limit(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Push channel URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Channels requested on every (re)connect.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Initial symbol selection; the first is the primary symbol.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub freshness: FreshnessPolicy,
    #[serde(default)]
    pub chart: ChartLayout,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8000/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_channels() -> Vec<String> {
    DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect()
}

fn default_symbols() -> Vec<String> {
    vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            channels: default_channels(),
            symbols: default_symbols(),
            api: ApiConfig::default(),
            poll: PollConfig::default(),
            freshness: FreshnessPolicy::default(),
            chart: ChartLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn subscription(&self) -> AppResult<SubscriptionSet> {
        Ok(SubscriptionSet::new(&self.symbols)?)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.subscription()?;

        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "ws_url must be ws:// or wss://, got {}",
                self.ws_url
            )));
        }
        let base = &self.api.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "api.base_url must be http:// or https://, got {base}"
            )));
        }
        if self.poll.interval_ms == 0 {
            return Err(AppError::Config("poll.interval_ms must be > 0".to_string()));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(AppError::Config("reconnect_delay_ms must be > 0".to_string()));
        }
        if self.api.request_timeout_ms == Some(0) {
            return Err(AppError::Config(
                "api.request_timeout_ms must be > 0 when set".to_string(),
            ));
        }
        self.chart.validate()?;
        Ok(())
    }
}
