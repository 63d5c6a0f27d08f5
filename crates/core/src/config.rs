//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SATCHEL_*)
//! 2. TOML config file (if SATCHEL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SATCHEL_*)
/// 2. TOML config file (if SATCHEL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite entry store.
    ///
    /// Set via SATCHEL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the embedding application is served from, used for
    /// same-origin route predicates.
    ///
    /// Set via SATCHEL_APP_ORIGIN environment variable.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// User-Agent string for outbound fetches.
    ///
    /// Set via SATCHEL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Fetch timeout in milliseconds.
    ///
    /// Set via SATCHEL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow per fetch.
    ///
    /// Set via SATCHEL_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Path to the build-supplied precache manifest (JSON array of
    /// `{url, revision}`). When unset, the install step is skipped.
    ///
    /// Set via SATCHEL_MANIFEST_PATH environment variable.
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,

    /// Maximum concurrent fetches during precache install.
    ///
    /// Set via SATCHEL_PRECACHE_CONCURRENCY environment variable.
    #[serde(default = "default_precache_concurrency")]
    pub precache_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./satchel-cache.sqlite")
}

fn default_app_origin() -> String {
    "https://localhost".into()
}

fn default_user_agent() -> String {
    "satchel/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_precache_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            app_origin: default_app_origin(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            manifest_path: None,
            precache_concurrency: default_precache_concurrency(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SATCHEL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SATCHEL_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `app_origin` is empty
    /// - `precache_concurrency` is 0 or exceeds 16
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.app_origin.is_empty() {
            return Err(ConfigError::Invalid { field: "app_origin".into(), reason: "must not be empty".into() });
        }

        if self.precache_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "precache_concurrency".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.precache_concurrency > 16 {
            return Err(ConfigError::Invalid {
                field: "precache_concurrency".into(),
                reason: "must not exceed 16".into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./satchel-cache.sqlite"));
        assert_eq!(config.user_agent, "satchel/0.1");
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.precache_concurrency, 4);
        assert!(config.manifest_path.is_none());
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        let config = AppConfig { precache_concurrency: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = AppConfig { precache_concurrency: 17, ..Default::default() };
        assert!(config.validate().is_err());

        let config = AppConfig { precache_concurrency: 16, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
