//! Layered configuration.
//!
//! Configuration is read from a TOML or JSON file (chosen by extension) and
//! then overridden by `CASA_*` environment variables. Every section has
//! defaults, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CasaConfig {
    /// Cache TTLs and header behaviour.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Backend query timeouts and retries.
    #[serde(default)]
    pub query: QuerySettings,

    /// Background session keep-alive.
    #[serde(default)]
    pub keepalive: KeepAliveSettings,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server-side cache TTLs per resource family, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_product_list_ttl")]
    pub product_list_ttl_secs: u64,

    #[serde(default = "default_product_detail_ttl")]
    pub product_detail_ttl_secs: u64,

    #[serde(default = "default_stats_ttl")]
    pub stats_ttl_secs: u64,

    #[serde(default = "default_categories_ttl")]
    pub categories_ttl_secs: u64,

    #[serde(default = "default_reviews_ttl")]
    pub reviews_ttl_secs: u64,

    #[serde(default = "default_admin_orders_ttl")]
    pub admin_orders_ttl_secs: u64,

    /// Emit `X-Cache-Status` when the request sends `X-Debug-Cache: 1`.
    #[serde(default)]
    pub debug_headers: bool,
}

fn default_product_list_ttl() -> u64 {
    300
}

fn default_product_detail_ttl() -> u64 {
    300
}

fn default_stats_ttl() -> u64 {
    600
}

fn default_categories_ttl() -> u64 {
    600
}

fn default_reviews_ttl() -> u64 {
    300
}

fn default_admin_orders_ttl() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            product_list_ttl_secs: default_product_list_ttl(),
            product_detail_ttl_secs: default_product_detail_ttl(),
            stats_ttl_secs: default_stats_ttl(),
            categories_ttl_secs: default_categories_ttl(),
            reviews_ttl_secs: default_reviews_ttl(),
            admin_orders_ttl_secs: default_admin_orders_ttl(),
            debug_headers: false,
        }
    }
}

/// Backend query behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff step in milliseconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Overall budget across all attempts, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_budget_ms: Option<u64>,
}

fn default_attempt_timeout() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base() -> u64 {
    1_000
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            total_budget_ms: None,
        }
    }
}

/// Session keep-alive behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepAliveSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_keepalive_interval")]
    pub interval_secs: u64,

    /// Health checks slower than this trigger a session refresh.
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_keepalive_interval() -> u64 {
    180
}

fn default_latency_threshold() -> u64 {
    2_000
}

impl Default for KeepAliveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_keepalive_interval(),
            latency_threshold_ms: default_latency_threshold(),
        }
    }
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for production/log aggregation).
    #[default]
    Json,
    /// Human-readable format (for development).
    Human,
}

impl std::str::FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "human" | "pretty" | "text" => Ok(Self::Human),
            _ => Err(()),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl CasaConfig {
    /// Load config from a file, apply environment overrides, and validate.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config = Self::parse(path, &content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config text; JSON when `path` ends in `.json`, TOML otherwise.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse JSON config: {}", path))
        } else {
            toml::from_str(content).with_context(|| format!("Failed to parse TOML config: {}", path))
        }
    }

    /// Apply `CASA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> std::result::Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("CASA_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("CASA_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CASA_LOG_FORMAT",
                value: format.clone(),
            })?;
        }

        if let Some(retries) = lookup("CASA_QUERY_MAX_RETRIES") {
            self.query.max_retries = retries.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "CASA_QUERY_MAX_RETRIES",
                value: retries.clone(),
            })?;
        }

        if let Some(enabled) = lookup("CASA_KEEPALIVE_ENABLED") {
            self.keepalive.enabled = match enabled.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "CASA_KEEPALIVE_ENABLED",
                        value: enabled,
                    })
                }
            };
        }

        Ok(())
    }

    /// Reject settings that would disable caching or timeouts by accident.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let ttls = [
            ("cache.product_list_ttl_secs", self.cache.product_list_ttl_secs),
            ("cache.product_detail_ttl_secs", self.cache.product_detail_ttl_secs),
            ("cache.stats_ttl_secs", self.cache.stats_ttl_secs),
            ("cache.categories_ttl_secs", self.cache.categories_ttl_secs),
            ("cache.reviews_ttl_secs", self.cache.reviews_ttl_secs),
            ("cache.admin_orders_ttl_secs", self.cache.admin_orders_ttl_secs),
            ("query.attempt_timeout_ms", self.query.attempt_timeout_ms),
            ("keepalive.interval_secs", self.keepalive.interval_secs),
        ];

        for (field, value) in ttls {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        if self.query.total_budget_ms == Some(0) {
            return Err(ConfigError::Zero {
                field: "query.total_budget_ms",
            });
        }

        Ok(())
    }
}
