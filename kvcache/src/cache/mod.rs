//! Cache module
//!
//! Key-value caching against a Redis-compatible server:
//! - [`Cache`] - capability contract every backend offers
//! - [`RedisCache`] - adapter forwarding each call to one store connection
//! - [`ConnectionRegistry`] - opens connections, shares persistent ones
//! - [`CacheService`] - typed access on top of any `Cache`

mod adapter;
mod backend;
mod error;
mod key;
mod registry;
pub mod store;
mod value;

use std::sync::Arc;
use std::time::Duration;

pub use adapter::RedisCache;
pub use backend::Cache;
pub use error::{CacheError, ConfigurationError};
pub use key::sanitize_key;
pub use registry::ConnectionRegistry;
pub use value::{CacheValue, MsgPack};

use crate::core::config::CacheConfig;
use crate::core::constants::DEFAULT_LIFETIME;

/// Cache service providing typed access to a cache backend
///
/// Wraps the backend and provides:
/// - Raw bytes API for flexibility
/// - Typed API through [`CacheValue`]
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn Cache>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    /// Connect a Redis adapter from configuration
    pub async fn connect(
        config: &CacheConfig,
        registry: &ConnectionRegistry,
    ) -> Result<Self, CacheError> {
        let adapter = RedisCache::connect(config, registry).await?;
        Ok(Self::new(Arc::new(adapter)))
    }

    pub fn new(backend: Arc<dyn Cache>) -> Self {
        Self { backend }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    // =========================================================================
    // Raw bytes API
    // =========================================================================

    /// Get raw bytes from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    /// Set raw bytes in cache
    pub async fn set_raw(&self, key: &str, value: Vec<u8>, lifetime: Duration) -> bool {
        self.backend.set(key, value, lifetime).await
    }

    // =========================================================================
    // Typed API
    // =========================================================================

    /// Get a typed value, or `default` when the key is absent
    pub async fn get<V: CacheValue>(
        &self,
        key: &str,
        default: Option<V>,
    ) -> Result<Option<V>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => V::decode(bytes).map(Some),
            None => Ok(default),
        }
    }

    /// Set a typed value; `false` if it could not be encoded or stored
    pub async fn set<V: CacheValue>(&self, key: &str, value: &V, lifetime: Duration) -> bool {
        match value.encode() {
            Ok(bytes) => self.set_raw(key, bytes, lifetime).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache value encoding failed");
                false
            }
        }
    }

    /// Set a typed value with the default lifetime
    pub async fn put<V: CacheValue>(&self, key: &str, value: &V) -> bool {
        self.set(key, value, DEFAULT_LIFETIME).await
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Remaining seconds to live (`-1` no expiry, `-2` missing)
    pub async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        self.backend.ttl(key).await
    }

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> bool {
        self.backend.delete(key).await
    }

    /// Delete every key on the server, not only this service's
    pub async fn delete_all(&self) -> bool {
        self.backend.delete_all().await
    }

    /// Atomic increment
    pub async fn increment(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        self.backend.increment(key, step).await
    }

    /// Atomic decrement
    pub async fn decrement(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        self.backend.decrement(key, step).await
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.exists(key).await
    }

    /// Reset the expiry of an existing key
    pub async fn expire(&self, key: &str, lifetime: Duration) -> bool {
        self.backend.expire(key, lifetime).await
    }

    /// Health check
    pub async fn ping(&self) -> Result<(), CacheError> {
        self.backend.ping().await
    }
}
