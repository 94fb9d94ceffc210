//! Configuration management for the finviz proxy.
//!
//! The proxy reads an optional configuration file at `~/.finviz-proxy/config.json`.
//! Every field has a default, so an absent file yields a working configuration.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (`FINVIZ_*` prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FINVIZ_PORT` → network.port
//! - `FINVIZ_BIND_ADDRESS` → network.bind
//! - `FINVIZ_TIMEOUT` → server.timeout_secs (accepts `60`, `60s`, `1m`)
//! - `FINVIZ_THROTTLE` → server.throttle
//! - `FINVIZ_CACHE_TTL` → server.cache_ttl_secs (same duration syntax)
//! - `FINVIZ_ELITE_LOGIN` → elite.enabled
//! - `FINVIZ_EMAIL` → elite.email
//! - `FINVIZ_PASSWORD` → elite.password
//! - `FINVIZ_LOG_LEVEL` → observability.log_level
//! - `FINVIZ_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::parse_duration_secs;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".finviz-proxy"),
        |dirs| dirs.home_dir().join(".finviz-proxy"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default: "0.0.0.0"
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port. Default: 8000
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8000
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Request-serving limits and the response cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Per-request timeout, also used as the per-cycle timeout of background refreshes
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of requests served concurrently
    #[serde(default = "default_throttle")]
    pub throttle: usize,

    /// Time-to-live of cached tables
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            throttle: default_throttle(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_throttle() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    60
}

// ============================================================================
// Upstream Configuration
// ============================================================================

/// Upstream site endpoints and client identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Public site base URL
    #[serde(default = "default_public_base")]
    pub public_base: String,

    /// Elite (authenticated) site base URL; its host is the post-login redirect target
    #[serde(default = "default_elite_base")]
    pub elite_base: String,

    /// User-Agent sent with every data request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// User-Agent sent with the login form
    #[serde(default = "default_login_user_agent")]
    pub login_user_agent: String,

    /// Hard ceiling on a single upstream request
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            public_base: default_public_base(),
            elite_base: default_elite_base(),
            user_agent: default_user_agent(),
            login_user_agent: default_login_user_agent(),
            client_timeout_secs: default_client_timeout_secs(),
        }
    }
}

fn default_public_base() -> String {
    "https://finviz.com".into()
}

fn default_elite_base() -> String {
    "https://elite.finviz.com".into()
}

fn default_user_agent() -> String {
    "curl/7.88.1".into()
}

fn default_login_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0".into()
}

fn default_client_timeout_secs() -> u64 {
    60
}

// ============================================================================
// Elite Configuration
// ============================================================================

/// Credentials for the paid (elite) mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EliteConfig {
    /// Log in at startup and serve from the elite site
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl EliteConfig {
    /// Both credentials, when present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().filter(|e| !e.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }
}

// ============================================================================
// Refresh Configuration
// ============================================================================

/// Intervals of the background refresh tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Vocabulary (filters, sorters, signals) refresh interval
    #[serde(default = "default_vocabulary_interval_secs")]
    pub vocabulary_interval_secs: u64,

    /// Futures quotes refresh interval
    #[serde(default = "default_futures_interval_secs")]
    pub futures_interval_secs: u64,

    /// News and blogs refresh interval
    #[serde(default = "default_news_interval_secs")]
    pub news_interval_secs: u64,

    /// Elite session re-login interval
    #[serde(default = "default_login_interval_secs")]
    pub login_interval_secs: u64,
}

impl RefreshConfig {
    pub fn vocabulary_interval(&self) -> Duration {
        Duration::from_secs(self.vocabulary_interval_secs)
    }

    pub fn futures_interval(&self) -> Duration {
        Duration::from_secs(self.futures_interval_secs)
    }

    pub fn news_interval(&self) -> Duration {
        Duration::from_secs(self.news_interval_secs)
    }

    pub fn login_interval(&self) -> Duration {
        Duration::from_secs(self.login_interval_secs)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            vocabulary_interval_secs: default_vocabulary_interval_secs(),
            futures_interval_secs: default_futures_interval_secs(),
            news_interval_secs: default_news_interval_secs(),
            login_interval_secs: default_login_interval_secs(),
        }
    }
}

fn default_vocabulary_interval_secs() -> u64 {
    3600
}

fn default_futures_interval_secs() -> u64 {
    10
}

fn default_news_interval_secs() -> u64 {
    60
}

fn default_login_interval_secs() -> u64 {
    24 * 3600
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub elite: EliteConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("FINVIZ_PORT") {
            match port.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid FINVIZ_PORT"),
            }
        }

        if let Some(bind) = lookup("FINVIZ_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Some(timeout) = lookup("FINVIZ_TIMEOUT") {
            match parse_duration_secs(&timeout) {
                Ok(secs) => self.server.timeout_secs = secs,
                Err(e) => tracing::warn!(value = %timeout, error = %e, "Ignoring invalid FINVIZ_TIMEOUT"),
            }
        }

        if let Some(throttle) = lookup("FINVIZ_THROTTLE") {
            match throttle.parse() {
                Ok(t) => self.server.throttle = t,
                Err(_) => tracing::warn!(value = %throttle, "Ignoring invalid FINVIZ_THROTTLE"),
            }
        }

        if let Some(ttl) = lookup("FINVIZ_CACHE_TTL") {
            match parse_duration_secs(&ttl) {
                Ok(secs) => self.server.cache_ttl_secs = secs,
                Err(e) => tracing::warn!(value = %ttl, error = %e, "Ignoring invalid FINVIZ_CACHE_TTL"),
            }
        }

        if let Some(enabled) = lookup("FINVIZ_ELITE_LOGIN") {
            self.elite.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(email) = lookup("FINVIZ_EMAIL") {
            self.elite.email = Some(email);
        }

        if let Some(password) = lookup("FINVIZ_PASSWORD") {
            self.elite.password = Some(password);
        }

        if let Some(level) = lookup("FINVIZ_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Some(format) = lookup("FINVIZ_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Socket address string the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }
}
