//! Store connections
//!
//! A [`StoreConnection`] is the network client of the key-value server. It
//! speaks in already-normalized keys and raw bytes; translating results into
//! the cache contract is the adapter's job.
//!
//! A [`Connector`] opens connections for a server configuration. The
//! [`ConnectionRegistry`](super::ConnectionRegistry) decides whether a
//! connection is opened fresh or shared.

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{CacheError, ConfigurationError};
use crate::core::config::ServerConfig;

pub use memory::{MemoryConnector, MemoryStore};

/// Request/response primitives offered by the store
///
/// Each method is one round trip. Atomicity of `incr_by`/`decr_by` is the
/// store's guarantee.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// `GET`: `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// `SETEX`: value and expiry in one command
    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<(), CacheError>;

    /// `TTL`: remaining seconds, `-1` without expiry, `-2` when absent
    async fn ttl(&self, key: &str) -> Result<i64, CacheError>;

    /// `DEL`: number of keys removed
    async fn del(&self, key: &str) -> Result<u64, CacheError>;

    /// `FLUSHALL`: every key on the server
    async fn flush_all(&self) -> Result<(), CacheError>;

    /// `INCRBY`
    async fn incr_by(&self, key: &str, step: i64) -> Result<i64, CacheError>;

    /// `DECRBY`
    async fn decr_by(&self, key: &str, step: i64) -> Result<i64, CacheError>;

    /// `EXISTS`
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// `EXPIRE`: `false` when the key does not exist
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError>;

    /// `PING`
    async fn ping(&self) -> Result<(), CacheError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}

/// Opens store connections
#[async_trait]
pub trait Connector: Send + Sync {
    /// Store client name, used in capability errors and logs
    fn name(&self) -> &'static str;

    /// Fails when this build cannot talk to the store at all
    fn ensure_available(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Open a new connection. Failures are `CacheError::Connection`.
    async fn open(&self, server: &ServerConfig) -> Result<Arc<dyn StoreConnection>, CacheError>;
}

/// Connector for Redis-compatible servers
///
/// Requires the `redis-cache` feature; without it every attempt fails with
/// [`ConfigurationError::CapabilityMissing`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

const REDIS: &str = "redis";

#[async_trait]
impl Connector for RedisConnector {
    fn name(&self) -> &'static str {
        REDIS
    }

    fn ensure_available(&self) -> Result<(), ConfigurationError> {
        if cfg!(feature = "redis-cache") {
            Ok(())
        } else {
            Err(ConfigurationError::CapabilityMissing(REDIS))
        }
    }

    async fn open(&self, server: &ServerConfig) -> Result<Arc<dyn StoreConnection>, CacheError> {
        self.ensure_available()?;
        open_redis(server).await
    }
}

#[cfg(feature = "redis-cache")]
async fn open_redis(server: &ServerConfig) -> Result<Arc<dyn StoreConnection>, CacheError> {
    Ok(Arc::new(redis::RedisConnection::open(server).await?))
}

#[cfg(not(feature = "redis-cache"))]
async fn open_redis(_server: &ServerConfig) -> Result<Arc<dyn StoreConnection>, CacheError> {
    Err(ConfigurationError::CapabilityMissing(REDIS).into())
}
