//! Cache error types

use thiserror::Error;

/// Problems detected before the adapter talks to its server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The store client is not compiled into this build
    #[error("{0} client support is not available in this build")]
    CapabilityMissing(&'static str),

    #[error("No cache server defined in configuration")]
    MissingServer,

    #[error("Invalid cache configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Could not connect to cache host '{host}' using port {port}: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "redis-cache")]
    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),
}

impl CacheError {
    pub(crate) fn connection(host: &str, port: u16, reason: impl ToString) -> Self {
        Self::Connection {
            host: host.to_string(),
            port,
            reason: reason.to_string(),
        }
    }

    /// True for errors raised while constructing an adapter
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
