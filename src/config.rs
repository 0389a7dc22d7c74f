//! Configuration management for mediasift.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use crate::render::{DEFAULT_RENDER_HOST, RenderEndpoint};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application name used for config directory.
const APP_NAME: &str = "mediasift";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable consulted when no rendering endpoint is configured.
pub const RENDERING_ENDPOINT_ENV: &str = "BROWSERLESS_URL";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plain page fetching.
    pub fetch: FetchConfig,

    /// Remote rendering service.
    pub rendering: RenderingConfig,

    /// Result caching.
    pub cache: CacheConfig,

    /// Log output.
    pub logging: LoggingConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// HTTP fetch behaviour for target sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total number of attempts per page (including the first).
    pub max_attempts: u32,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Base of the exponential backoff, in milliseconds.
    pub backoff_base_ms: u64,

    /// Upper bound of the random jitter added to each backoff, in milliseconds.
    pub jitter_ms: u64,

    /// Accept-Language header sent with every request.
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 15,
            backoff_base_ms: 1000,
            jitter_ms: 1000,
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
        }
    }
}

impl FetchConfig {
    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remote rendering service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Bare tokens or full endpoint URLs. One is picked at random per extraction.
    pub endpoints: Vec<String>,

    /// Host used when an endpoint is given as a bare token.
    pub default_host: String,

    /// Extra time granted to the rendering round trip on top of the page timeout.
    pub grace_ms: u64,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            default_host: DEFAULT_RENDER_HOST.to_string(),
            grace_ms: 5000,
        }
    }
}

impl RenderingConfig {
    /// Picks one configured endpoint uniformly at random.
    pub fn pick_endpoint(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.endpoints.len());
        Some(self.endpoints[idx].as_str())
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether lookups are cached in memory.
    pub enabled: bool,

    /// Time-to-live of cached entries in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 2 * 60 * 60,
        }
    }
}

impl CacheConfig {
    /// Time-to-live of cached entries.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Media source JSON document.
    pub sources_file: Option<PathBuf>,
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch.max_attempts".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch.timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        for endpoint in &self.rendering.endpoints {
            RenderEndpoint::parse(endpoint, &self.rendering.default_host).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "rendering.endpoints".to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        Ok(())
    }

    /// Returns the media source file to load, preferring an explicit override.
    pub fn sources_file(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.paths.sources_file.clone())
            .ok_or_else(|| {
                ConfigError::MissingValue(
                    "paths.sources_file (or pass --sources <FILE>)".to_string(),
                )
            })
    }
}
