//! Cache adapter over a single store connection
//!
//! `RedisCache` is a pass-through: it keeps no entries of its own. Each call
//! normalizes the key, makes one round trip and translates the reply into
//! the [`Cache`] contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::Cache;
use super::error::CacheError;
use super::key::sanitize_key;
use super::registry::ConnectionRegistry;
use super::store::StoreConnection;
use crate::core::config::{CacheConfig, ServerConfig};
use crate::core::constants::FLUSH_SETTLE_DELAY;

/// Cache adapter for Redis-compatible servers
pub struct RedisCache {
    store: Arc<dyn StoreConnection>,
    server: ServerConfig,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("backend", &self.store.backend_name())
            .field("server", &self.server)
            .finish()
    }
}

impl RedisCache {
    /// Connect an adapter using `config`
    ///
    /// Checks, in order: the store client is compiled in, a server is
    /// configured (and valid), the server can be reached. The connection is
    /// taken from `registry`, shared when `server.persistent` is set.
    pub async fn connect(
        config: &CacheConfig,
        registry: &ConnectionRegistry,
    ) -> Result<Self, CacheError> {
        registry.connector().ensure_available()?;
        let server = config.server()?;

        tracing::debug!(
            host = %server.host,
            port = server.port,
            persistent = server.persistent,
            connector = registry.connector().name(),
            "Connecting cache adapter"
        );
        let store = registry.acquire(server).await?;

        Ok(Self {
            store,
            server: server.clone(),
        })
    }

    /// Build an adapter around an already-open connection
    pub fn with_store(server: ServerConfig, store: Arc<dyn StoreConnection>) -> Self {
        Self { store, server }
    }

    /// Configuration this adapter was built with
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }
}

/// Whole seconds for the store, rounding sub-second remainders up
fn lifetime_secs(lifetime: Duration) -> u64 {
    let secs = lifetime.as_secs();
    if lifetime.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// Collapse a store reply into the boolean contract, logging failures
fn acknowledged(operation: &'static str, key: &str, result: Result<bool, CacheError>) -> bool {
    match result {
        Ok(ack) => ack,
        Err(e) => {
            tracing::warn!(operation, key = %key, error = %e, "Cache operation failed");
            false
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = sanitize_key(key)?;
        let value = self.store.get(&key).await?;
        tracing::trace!(key = %key, hit = value.is_some(), "Cache get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, lifetime: Duration) -> bool {
        let result = match sanitize_key(key) {
            Ok(key) => self
                .store
                .set_ex(&key, value, lifetime_secs(lifetime))
                .await
                .map(|()| true),
            Err(e) => Err(e),
        };
        acknowledged("set", key, result)
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let key = sanitize_key(key)?;
        self.store.ttl(&key).await
    }

    async fn delete(&self, key: &str) -> bool {
        let result = match sanitize_key(key) {
            Ok(key) => self.store.del(&key).await.map(|removed| removed > 0),
            Err(e) => Err(e),
        };
        acknowledged("delete", key, result)
    }

    async fn delete_all(&self) -> bool {
        tracing::warn!(
            host = %self.server.host,
            port = self.server.port,
            "Flushing all keys on cache server"
        );
        let result = self.store.flush_all().await.map(|()| true);

        // Writes issued right after a flush can be lost; settle first
        tokio::time::sleep(FLUSH_SETTLE_DELAY).await;

        acknowledged("delete_all", "*", result)
    }

    async fn increment(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        let key = sanitize_key(key)?;
        self.store.incr_by(&key, step).await
    }

    async fn decrement(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        let key = sanitize_key(key)?;
        self.store.decr_by(&key, step).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let key = sanitize_key(key)?;
        self.store.exists(&key).await
    }

    async fn expire(&self, key: &str, lifetime: Duration) -> bool {
        let seconds = i64::try_from(lifetime_secs(lifetime)).unwrap_or(i64::MAX);
        let result = match sanitize_key(key) {
            Ok(key) => self.store.expire(&key, seconds).await,
            Err(e) => Err(e),
        };
        acknowledged("expire", key, result)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.store.ping().await
    }

    fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ConfigurationError;
    use crate::cache::store::{MemoryConnector, MemoryStore};
    use crate::core::constants::{DEFAULT_LIFETIME, MAX_LIFETIME, TTL_MISSING, TTL_NO_EXPIRY};
    use serde_json::json;

    fn memory_cache() -> (MemoryStore, RedisCache) {
        let store = MemoryStore::new();
        let cache = RedisCache::with_store(
            ServerConfig::new("memory", 6379),
            Arc::new(store.clone()),
        );
        (store, cache)
    }

    /// Store whose every command fails, like a server that went away
    struct BrokenStore;

    fn broken() -> CacheError {
        CacheError::Operation("connection reset by peer".to_string())
    }

    #[async_trait]
    impl StoreConnection for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(broken())
        }

        async fn set_ex(&self, _key: &str, _value: Vec<u8>, _seconds: u64) -> Result<(), CacheError> {
            Err(broken())
        }

        async fn ttl(&self, _key: &str) -> Result<i64, CacheError> {
            Err(broken())
        }

        async fn del(&self, _key: &str) -> Result<u64, CacheError> {
            Err(broken())
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            Err(broken())
        }

        async fn incr_by(&self, _key: &str, _step: i64) -> Result<i64, CacheError> {
            Err(broken())
        }

        async fn decr_by(&self, _key: &str, _step: i64) -> Result<i64, CacheError> {
            Err(broken())
        }

        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(broken())
        }

        async fn expire(&self, _key: &str, _seconds: i64) -> Result<bool, CacheError> {
            Err(broken())
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(broken())
        }

        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn broken_cache() -> RedisCache {
        RedisCache::with_store(ServerConfig::new("broken", 6379), Arc::new(BrokenStore))
    }

    fn config(host: &str, persistent: bool) -> CacheConfig {
        CacheConfig::from_value(json!({
            "server": { "host": host, "port": 6379, "timeout": 1, "persistent": persistent }
        }))
        .unwrap()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[tokio::test]
    async fn test_connect_without_server() {
        let registry = ConnectionRegistry::new(Arc::new(MemoryConnector::new()));
        let config = CacheConfig::from_value(json!({})).unwrap();

        let err = RedisCache::connect(&config, &registry).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Configuration(ConfigurationError::MissingServer)
        ));
    }

    #[tokio::test]
    async fn test_connect_unreachable_host() {
        let connector = Arc::new(MemoryConnector::new());
        connector.mark_unreachable("down.internal", 6379);
        let registry = ConnectionRegistry::new(connector);

        let err = RedisCache::connect(&config("down.internal", false), &registry)
            .await
            .unwrap_err();
        match err {
            CacheError::Connection { host, port, .. } => {
                assert_eq!(host, "down.internal");
                assert_eq!(port, 6379);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_persistent_shares_connection() {
        let connector = Arc::new(MemoryConnector::new());
        let registry = ConnectionRegistry::new(connector.clone());

        let first = RedisCache::connect(&config("cache", true), &registry)
            .await
            .unwrap();
        let second = RedisCache::connect(&config("cache", true), &registry)
            .await
            .unwrap();
        assert_eq!(connector.opened(), 1);

        assert!(first.set("shared", b"1".to_vec(), DEFAULT_LIFETIME).await);
        assert_eq!(second.get("shared").await.unwrap(), Some(b"1".to_vec()));
        assert!(second.server().persistent);
    }

    #[tokio::test]
    async fn test_connect_transient_opens_per_adapter() {
        let connector = Arc::new(MemoryConnector::new());
        let registry = ConnectionRegistry::new(connector.clone());

        RedisCache::connect(&config("cache", false), &registry)
            .await
            .unwrap();
        RedisCache::connect(&config("cache", false), &registry)
            .await
            .unwrap();
        assert_eq!(connector.opened(), 2);
    }

    #[cfg(feature = "redis-cache")]
    #[tokio::test]
    async fn test_connect_redis_refused() {
        let registry = ConnectionRegistry::redis();
        let config = CacheConfig::from_value(json!({
            "server": { "host": "127.0.0.1", "port": 1, "timeout": 2 }
        }))
        .unwrap();

        let err = RedisCache::connect(&config, &registry).await.unwrap_err();
        assert!(matches!(err, CacheError::Connection { port: 1, .. }));
    }

    #[cfg(not(feature = "redis-cache"))]
    #[tokio::test]
    async fn test_connect_redis_capability_missing() {
        let registry = ConnectionRegistry::redis();
        // Reported before the missing server section is noticed
        let config = CacheConfig::from_value(json!({})).unwrap();

        let err = RedisCache::connect(&config, &registry).await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Configuration(ConfigurationError::CapabilityMissing("redis"))
        ));
    }

    // =========================================================================
    // get / set / ttl / delete
    // =========================================================================

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, cache) = memory_cache();

        assert!(cache.set("foo", b"bar".to_vec(), Duration::from_secs(600)).await);
        assert_eq!(cache.get("foo").await.unwrap(), Some(b"bar".to_vec()));

        let ttl = cache.ttl("foo").await.unwrap();
        assert!(ttl > 0 && ttl <= 600);
    }

    #[tokio::test]
    async fn test_get_miss_is_not_an_error() {
        let (_, cache) = memory_cache();
        assert_eq!(cache.get("never-set").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_a_miss() {
        let (_, cache) = memory_cache();
        assert!(cache.set("empty", Vec::new(), DEFAULT_LIFETIME).await);
        assert_eq!(cache.get("empty").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_keys_are_sanitized_in_store() {
        let (store, cache) = memory_cache();

        assert!(cache.set("user/42 profile", b"x".to_vec(), DEFAULT_LIFETIME).await);
        assert_eq!(
            store.get("user%2F42%20profile").await.unwrap(),
            Some(b"x".to_vec())
        );
        assert_eq!(store.get("user/42 profile").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookalike_keys_do_not_collide() {
        let (_, cache) = memory_cache();

        assert!(cache.set("a/b", b"slash".to_vec(), DEFAULT_LIFETIME).await);
        assert!(cache.set("a_b", b"underscore".to_vec(), DEFAULT_LIFETIME).await);
        assert_eq!(cache.get("a/b").await.unwrap(), Some(b"slash".to_vec()));
        assert_eq!(cache.get("a_b").await.unwrap(), Some(b"underscore".to_vec()));
    }

    #[tokio::test]
    async fn test_subsecond_lifetime_rounds_up() {
        let (_, cache) = memory_cache();
        assert!(cache.set("short", b"v".to_vec(), Duration::from_millis(1500)).await);
        assert_eq!(cache.ttl("short").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_longest_documented_lifetime_accepted() {
        let (_, cache) = memory_cache();
        assert!(cache.set("month", b"v".to_vec(), MAX_LIFETIME).await);
        assert_eq!(
            cache.ttl("month").await.unwrap(),
            MAX_LIFETIME.as_secs() as i64
        );
    }

    #[tokio::test]
    async fn test_set_zero_lifetime_reports_false() {
        let (_, cache) = memory_cache();
        assert!(!cache.set("zero", b"v".to_vec(), Duration::ZERO).await);
        assert!(!cache.exists("zero").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_key() {
        let (_, cache) = memory_cache();
        assert!(matches!(cache.get("").await, Err(CacheError::InvalidKey(_))));
        assert!(!cache.set("", b"v".to_vec(), DEFAULT_LIFETIME).await);
        assert!(!cache.delete("").await);
    }

    #[tokio::test]
    async fn test_ttl_sentinels_pass_through() {
        let (_, cache) = memory_cache();
        assert_eq!(cache.ttl("missing").await.unwrap(), TTL_MISSING);

        cache.increment("counter", 1).await.unwrap();
        assert_eq!(cache.ttl("counter").await.unwrap(), TTL_NO_EXPIRY);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, cache) = memory_cache();

        assert!(cache.set("foo", b"bar".to_vec(), DEFAULT_LIFETIME).await);
        assert!(cache.delete("foo").await);
        assert_eq!(cache.get("foo").await.unwrap(), None);
        assert!(!cache.delete("foo").await);
    }

    // =========================================================================
    // delete_all
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_delete_all_flushes_every_namespace() {
        let connector = Arc::new(MemoryConnector::new());
        let registry = ConnectionRegistry::new(connector.clone());
        let sessions = RedisCache::connect(&config("cache", false), &registry)
            .await
            .unwrap();
        let counters = RedisCache::connect(&config("cache", false), &registry)
            .await
            .unwrap();

        assert!(sessions.set("session:1", b"a".to_vec(), DEFAULT_LIFETIME).await);
        counters.increment("hits", 3).await.unwrap();

        assert!(sessions.delete_all().await);
        assert_eq!(sessions.get("session:1").await.unwrap(), None);
        assert_eq!(counters.get("hits").await.unwrap(), None);
        assert!(connector.store("cache", 6379).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_all_waits_for_settle_delay() {
        let (_, cache) = memory_cache();

        let started = tokio::time::Instant::now();
        assert!(cache.delete_all().await);
        assert!(started.elapsed() >= FLUSH_SETTLE_DELAY);

        assert!(cache.set("after", b"v".to_vec(), DEFAULT_LIFETIME).await);
        assert_eq!(cache.get("after").await.unwrap(), Some(b"v".to_vec()));
    }

    // =========================================================================
    // increment / decrement / exists / expire
    // =========================================================================

    #[tokio::test]
    async fn test_increment_decrement() {
        let (_, cache) = memory_cache();

        assert_eq!(cache.increment("hits", 1).await.unwrap(), 1);
        assert_eq!(cache.increment("hits", 1).await.unwrap(), 2);
        assert_eq!(cache.decrement("hits", 1).await.unwrap(), 1);
        assert_eq!(cache.decrement("hits", 5).await.unwrap(), -4);
    }

    #[tokio::test]
    async fn test_increment_non_integer_is_error() {
        let (_, cache) = memory_cache();
        assert!(cache.set("name", b"alice".to_vec(), DEFAULT_LIFETIME).await);
        assert!(cache.increment("name", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_counter_ops_use_same_key_normalization() {
        let (store, cache) = memory_cache();

        assert_eq!(cache.increment("page views", 1).await.unwrap(), 1);
        assert_eq!(cache.get("page views").await.unwrap(), Some(b"1".to_vec()));
        assert!(cache.exists("page views").await.unwrap());
        assert!(store.exists("page%20views").await.unwrap());
        assert!(!store.exists("page views").await.unwrap());

        assert!(cache.expire("page views", Duration::from_secs(30)).await);
        assert_eq!(store.ttl("page%20views").await.unwrap(), 30);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let (_, cache) = memory_cache();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..250 {
                        cache.increment("counter", 3).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.increment("counter", 0).await.unwrap(), 8 * 250 * 3);
    }

    #[tokio::test]
    async fn test_exists() {
        let (_, cache) = memory_cache();
        assert!(!cache.exists("foo").await.unwrap());
        assert!(cache.set("foo", b"bar".to_vec(), DEFAULT_LIFETIME).await);
        assert!(cache.exists("foo").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let (_, cache) = memory_cache();
        assert!(!cache.expire("missing", Duration::from_secs(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lifecycle() {
        let (_, cache) = memory_cache();

        assert!(cache.set("session:42", b"payload".to_vec(), Duration::from_secs(600)).await);
        let ttl = cache.ttl("session:42").await.unwrap();
        assert!(ttl > 0 && ttl <= 600);

        assert!(cache.expire("session:42", Duration::from_secs(10)).await);
        let ttl = cache.ttl("session:42").await.unwrap();
        assert!(ttl > 0 && ttl <= 10);
        assert_eq!(
            cache.get("session:42").await.unwrap(),
            Some(b"payload".to_vec())
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("session:42").await.unwrap(), None);
        assert_eq!(cache.ttl("session:42").await.unwrap(), TTL_MISSING);
    }

    #[tokio::test]
    async fn test_backend_name_and_ping() {
        let (_, cache) = memory_cache();
        assert_eq!(cache.backend_name(), "memory");
        assert!(cache.ping().await.is_ok());
    }

    // =========================================================================
    // Store failures
    // =========================================================================

    #[tokio::test]
    async fn test_store_failure_acknowledgments_are_false() {
        let cache = broken_cache();

        assert!(!cache.set("k", b"v".to_vec(), DEFAULT_LIFETIME).await);
        assert!(!cache.delete("k").await);
        assert!(!cache.expire("k", Duration::from_secs(10)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_flush_still_waits_for_settle_delay() {
        let cache = broken_cache();

        let started = tokio::time::Instant::now();
        assert!(!cache.delete_all().await);
        assert!(started.elapsed() >= FLUSH_SETTLE_DELAY);
    }

    #[tokio::test]
    async fn test_store_failure_propagates_from_data_operations() {
        let cache = broken_cache();

        assert!(matches!(cache.get("k").await, Err(CacheError::Operation(_))));
        assert!(matches!(cache.ttl("k").await, Err(CacheError::Operation(_))));
        assert!(matches!(cache.exists("k").await, Err(CacheError::Operation(_))));
        assert!(cache.increment("k", 1).await.is_err());
        assert!(cache.decrement("k", 1).await.is_err());
        assert!(cache.ping().await.is_err());
    }
}
