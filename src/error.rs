//! Error types for mediasift.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Main error type for site-adapter operations.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// Every fetch attempt failed (network, HTTP status or empty body)
    #[error("Failed to fetch {url} after {attempts} attempts: {message}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    /// A URL could not be resolved to an absolute URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The detail page URL has no usable origin
    #[error("Invalid detail URL: {0}")]
    InvalidDetailUrl(String),

    /// Required media source configuration is missing or malformed
    #[error("Media source configuration error: {0}")]
    Config(String),

    /// The remote rendering service answered with a non-success status
    #[error("Rendering service error ({status}): {body}")]
    RenderingService { status: u16, body: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse a response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Media source document could not be decoded
    #[error("Invalid media source list: {0}")]
    SourceList(#[from] serde_json::Error),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
