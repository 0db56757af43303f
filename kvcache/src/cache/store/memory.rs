//! In-process store with Redis semantics
//!
//! Backs tests and local development without a server. Entries live in a
//! `DashMap`; expiry is checked lazily on access against the tokio clock, so
//! paused-time tests can move it forward.
//!
//! `MemoryConnector` plays the part of the network: every `host:port` maps to
//! one `MemoryStore`, shared by all connections opened to that endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::time::Instant;

use super::{Connector, StoreConnection};
use crate::cache::error::CacheError;
use crate::core::config::ServerConfig;
use crate::core::constants::{TTL_MISSING, TTL_NO_EXPIRY};

#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory key-value store
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run `f` on a live entry; purges the key if it has expired
    fn read<R>(&self, key: &str, f: impl FnOnce(&Entry) -> R) -> Option<R> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(f(entry.value())),
            Some(_) => {}
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Apply an integer change atomically, creating the key at 0
    fn apply_delta(
        &self,
        key: &str,
        op: impl FnOnce(i64) -> Option<i64>,
    ) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                data: b"0".to_vec(),
                expires_at: None,
            });

        if entry.is_expired(now) {
            entry.data = b"0".to_vec();
            entry.expires_at = None;
        }

        let current = std::str::from_utf8(&entry.data)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| {
                CacheError::Operation("value is not an integer or out of range".to_string())
            })?;
        let next = op(current).ok_or_else(|| {
            CacheError::Operation("increment or decrement would overflow".to_string())
        })?;

        // Existing expiry is kept, as INCRBY does
        entry.data = next.to_string().into_bytes();
        Ok(next)
    }
}

#[async_trait]
impl StoreConnection for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.read(key, |entry| entry.data.clone()))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<(), CacheError> {
        if seconds == 0 {
            return Err(CacheError::Operation(
                "invalid expire time in 'setex' command".to_string(),
            ));
        }
        let entry = Entry {
            data: value,
            expires_at: Instant::now().checked_add(Duration::from_secs(seconds)),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let now = Instant::now();
        let ttl = self.read(key, |entry| match entry.expires_at {
            None => TTL_NO_EXPIRY,
            Some(at) => {
                // Round to the nearest second like the server does
                let remaining_ms = at.saturating_duration_since(now).as_millis();
                i64::try_from((remaining_ms + 500) / 1000).unwrap_or(i64::MAX)
            }
        });
        Ok(ttl.unwrap_or(TTL_MISSING))
    }

    async fn del(&self, key: &str) -> Result<u64, CacheError> {
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired(now) => Ok(1),
            _ => Ok(0),
        }
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn incr_by(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        self.apply_delta(key, |current| current.checked_add(step))
    }

    async fn decr_by(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        self.apply_delta(key, |current| current.checked_sub(step))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.read(key, |_| ()).is_some())
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError> {
        if self.read(key, |_| ()).is_none() {
            return Ok(false);
        }

        // A non-positive expiry deletes the key immediately
        if seconds <= 0 {
            return Ok(self.entries.remove(key).is_some());
        }

        let expires_at = Instant::now().checked_add(Duration::from_secs(seconds.unsigned_abs()));
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Connector that hands out in-memory stores, one per endpoint
#[derive(Debug, Default)]
pub struct MemoryConnector {
    servers: DashMap<(String, u16), MemoryStore>,
    unreachable: DashSet<(String, u16)>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse connections to this endpoint from now on
    pub fn mark_unreachable(&self, host: &str, port: u16) {
        self.unreachable.insert((host.to_string(), port));
    }

    /// Accept connections to this endpoint again
    pub fn mark_reachable(&self, host: &str, port: u16) {
        self.unreachable.remove(&(host.to_string(), port));
    }

    /// Number of connections opened so far
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handle to the data behind an endpoint
    pub fn store(&self, host: &str, port: u16) -> MemoryStore {
        self.servers
            .entry((host.to_string(), port))
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self, server: &ServerConfig) -> Result<Arc<dyn StoreConnection>, CacheError> {
        let endpoint = (server.host.clone(), server.port);
        if self.unreachable.contains(&endpoint) {
            return Err(CacheError::connection(
                &server.host,
                server.port,
                "connection refused",
            ));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(host = %server.host, port = server.port, "Opened in-memory store connection");
        Ok(Arc::new(self.store(&server.host, server.port)))
    }
}
