//! Cache capability trait definition

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheError;

/// Cache capability trait
///
/// The contract every cache implementation offers. Code written against
/// `dyn Cache` does not care which store answers it.
///
/// # Failure reporting
///
/// Operations whose contract is a yes/no acknowledgment (`set`, `delete`,
/// `delete_all`, `expire`) report store failures as `false`. Operations that
/// return data (`get`, `ttl`, `increment`, `decrement`, `exists`) propagate
/// them as errors, since no return value could mean "failed". A cache miss is
/// never an error. Nothing is retried.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value; `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value that expires after `lifetime`
    ///
    /// Value and expiry are written in a single command, so the entry never
    /// exists without its expiry. Lifetimes beyond
    /// [`MAX_LIFETIME`](crate::core::constants::MAX_LIFETIME) are passed on
    /// unchanged; the store decides what to do with them.
    async fn set(&self, key: &str, value: Vec<u8>, lifetime: Duration) -> bool;

    /// Remaining seconds to live
    ///
    /// Negative replies are the store's sentinels and are returned as-is:
    /// `-1` for an entry without expiry, `-2` for a missing entry.
    async fn ttl(&self, key: &str) -> Result<i64, CacheError>;

    /// Delete a key; `true` only if something was removed
    async fn delete(&self, key: &str) -> bool;

    /// Delete every key on the server
    ///
    /// Not scoped to this cache: every client of the same server loses its
    /// entries too.
    async fn delete_all(&self) -> bool;

    /// Atomically add `step` to a counter, returning the new value
    async fn increment(&self, key: &str, step: i64) -> Result<i64, CacheError>;

    /// Atomically subtract `step` from a counter, returning the new value
    async fn decrement(&self, key: &str, step: i64) -> Result<i64, CacheError>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Reset the expiry of an existing key without touching its value
    async fn expire(&self, key: &str, lifetime: Duration) -> bool;

    /// Health check (validates connection)
    async fn ping(&self) -> Result<(), CacheError>;

    /// Backend name for debugging/logging
    fn backend_name(&self) -> &'static str;
}
