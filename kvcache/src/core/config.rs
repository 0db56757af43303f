use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::ConfigurationError;

use super::cli::CliConfig;
use super::constants::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};

// =============================================================================
// Cache Configuration
// =============================================================================

/// Connection parameters for the cache server
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connect and response timeout in seconds (fractions allowed)
    pub timeout: f64,
    /// Share one connection per host/port/timeout within the process
    #[serde(default)]
    pub persistent: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT_SECS,
            persistent: false,
        }
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    /// Timeout as a `Duration`
    pub fn timeout_duration(&self) -> Result<Duration, ConfigurationError> {
        if !(self.timeout.is_finite() && self.timeout > 0.0) {
            return Err(ConfigurationError::Invalid(format!(
                "server.timeout must be a positive number of seconds, got {}",
                self.timeout
            )));
        }
        Duration::try_from_secs_f64(self.timeout)
            .map_err(|e| ConfigurationError::Invalid(format!("server.timeout: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::Invalid(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigurationError::Invalid(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }
        self.timeout_duration().map(|_| ())
    }
}

/// Cache adapter configuration
///
/// Produced by whatever loads the application's configuration; this crate
/// only consumes the already-parsed document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
    pub server: Option<ServerConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl CacheConfig {
    pub fn with_server(server: ServerConfig) -> Self {
        Self {
            server: Some(server),
            extra: serde_json::Value::Null,
        }
    }

    /// Build from a pre-parsed JSON document
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))?;
        config.warn_unknown_fields();
        Ok(config)
    }

    /// The validated server section
    pub fn server(&self) -> Result<&ServerConfig, ConfigurationError> {
        let server = self
            .server
            .as_ref()
            .ok_or(ConfigurationError::MissingServer)?;
        server.validate()?;
        Ok(server)
    }

    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        let config = Self::from_value(value)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in cache config (ignored)"
            );
        }
    }

    /// Resolve the configuration for the CLI: file first, then CLI/env overrides
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };

        let overridden = cli.host.is_some()
            || cli.port.is_some()
            || cli.timeout.is_some()
            || cli.persistent.is_some();

        if overridden || config.server.is_none() {
            let server = config
                .server
                .get_or_insert_with(|| ServerConfig::new(DEFAULT_HOST, DEFAULT_PORT));
            if let Some(host) = &cli.host {
                tracing::trace!(host = %host, "Overriding server.host");
                server.host = host.clone();
            }
            if let Some(port) = cli.port {
                tracing::trace!(port, "Overriding server.port");
                server.port = port;
            }
            if let Some(timeout) = cli.timeout {
                tracing::trace!(timeout, "Overriding server.timeout");
                server.timeout = timeout;
            }
            if let Some(persistent) = cli.persistent {
                tracing::trace!(persistent, "Overriding server.persistent");
                server.persistent = persistent;
            }
        }

        Ok(config)
    }
}
