//! Connection registry
//!
//! Owns the connections that "persistent" adapters share. Each endpoint
//! (host, port, timeout) gets at most one shared connection per registry;
//! non-persistent adapters always get a fresh one.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::error::CacheError;
use super::store::{Connector, RedisConnector, StoreConnection};
use crate::core::config::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Endpoint {
    host: String,
    port: u16,
    timeout_bits: u64,
}

impl From<&ServerConfig> for Endpoint {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            timeout_bits: server.timeout.to_bits(),
        }
    }
}

type SharedSlot = Arc<OnceCell<Arc<dyn StoreConnection>>>;

pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    shared: DashMap<Endpoint, SharedSlot>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connector", &self.connector.name())
            .field("shared", &self.shared_connections())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            shared: DashMap::new(),
        }
    }

    /// Registry for Redis-compatible servers
    pub fn redis() -> Self {
        Self::new(Arc::new(RedisConnector))
    }

    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    /// Get a connection for `server`
    ///
    /// Persistent configurations share one connection per endpoint; the
    /// first caller opens it and concurrent callers wait for that attempt.
    /// A failed attempt is not remembered.
    pub async fn acquire(
        &self,
        server: &ServerConfig,
    ) -> Result<Arc<dyn StoreConnection>, CacheError> {
        if !server.persistent {
            tracing::debug!(host = %server.host, port = server.port, "Opening dedicated connection");
            return self.connector.open(server).await;
        }

        let endpoint = Endpoint::from(server);
        let slot: SharedSlot = self
            .shared
            .entry(endpoint.clone())
            .or_default()
            .value()
            .clone();
        let opened = slot
            .get_or_try_init(|| async {
                tracing::debug!(host = %server.host, port = server.port, "Opening shared connection");
                self.connector.open(server).await
            })
            .await;

        match opened {
            Ok(conn) => Ok(Arc::clone(conn)),
            Err(e) => {
                // Unreachable endpoints must not leave empty slots behind
                self.shared
                    .remove_if(&endpoint, |_, slot| !slot.initialized());
                Err(e)
            }
        }
    }

    /// Number of endpoints with an open shared connection
    pub fn shared_connections(&self) -> usize {
        self.shared
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    /// Forget the shared connection for `server`
    ///
    /// Adapters already holding it keep working; the next persistent
    /// acquire opens a new one. Returns `true` if a connection was dropped.
    pub fn release(&self, server: &ServerConfig) -> bool {
        self.shared
            .remove(&Endpoint::from(server))
            .is_some_and(|(_, slot)| slot.initialized())
    }
}
