//! Server configuration
//!
//! All fields have defaults, so an empty file (or no file at all) yields a
//! server on port 42069 that reads requests 1 KiB at a time.

use crate::http::parser::DEFAULT_READ_SIZE;
use crate::router::CorsOptions;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bytes requested from the socket per read while parsing a request
    pub read_buffer_size: usize,
    /// How long the accept loop waits before rechecking the closed flag
    pub accept_poll_interval_ms: u64,
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub log_filter: String,
    /// Installs the CORS middleware when present
    pub cors: Option<CorsOptions>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 42069,
            read_buffer_size: DEFAULT_READ_SIZE,
            accept_poll_interval_ms: 50,
            log_filter: "info".to_string(),
            cors: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        if self.accept_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "accept_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Address the listener binds to, in `host:port` form
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.accept_poll_interval_ms)
    }
}
