//! Configuration loading for the evkit client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use evkit_core::{BrandConfig, BrandRegistry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "EVKIT_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend base URL; without one, calls answer "not available".
    pub api_base_url: Option<String>,
    pub transport_name: String,
    pub request_timeout_ms: u64,
    pub diagnostics: DiagnosticsConfig,
    pub cache: CacheSection,
    /// Explicit route table; every method is forwarded when absent.
    pub routes: Option<Vec<String>>,
    pub brands: Vec<BrandConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    pub namespace: String,
    pub default_stale_ms: u64,
    /// LMDB directory; entries stay in memory when absent.
    pub store_path: Option<PathBuf>,
    pub max_size_mb: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Missing configuration file path (use --config or EVKIT_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] evkit_core::ConfigError),
}

fn invalid(field: &str, reason: &str) -> evkit_core::ConfigError {
    evkit_core::ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigLoadError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigLoadError::MissingConfigPath)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigLoadError> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), evkit_core::ConfigError> {
        if let Some(url) = &self.api_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("api_base_url", "must start with http:// or https://"));
            }
        }
        if self.transport_name.trim().is_empty() {
            return Err(invalid("transport_name", "must not be empty"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.diagnostics.capacity == 0 {
            return Err(invalid("diagnostics.capacity", "must be > 0"));
        }
        if self.cache.namespace.trim().is_empty() {
            return Err(invalid("cache.namespace", "must not be empty"));
        }
        if self.cache.namespace.contains(':') {
            return Err(invalid("cache.namespace", "must not contain ':'"));
        }
        if self.cache.max_size_mb == 0 {
            return Err(invalid("cache.max_size_mb", "must be > 0"));
        }
        if let Some(path) = &self.cache.store_path {
            if path.as_os_str().is_empty() {
                return Err(invalid("cache.store_path", "must not be empty"));
            }
        }
        if self.brands.is_empty() {
            return Err(evkit_core::ConfigError::MissingRequired {
                field: "brands".to_string(),
            });
        }
        BrandRegistry::from_config(&self.brands)?;
        if let Some(routes) = &self.routes {
            crate::router::RouteTable::explicit(routes.iter().cloned())?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn default_stale(&self) -> Duration {
        Duration::from_millis(self.cache.default_stale_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
