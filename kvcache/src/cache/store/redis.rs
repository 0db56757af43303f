//! Redis-compatible store connection
//!
//! Feature-gated behind `redis-cache` feature.
//!
//! One `MultiplexedConnection` per `RedisConnection`: clones share the same
//! socket, so a connection kept in the registry serves every adapter built
//! for that endpoint. The configured timeout bounds the connect attempt and
//! every command.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::aio::MultiplexedConnection;
use deadpool_redis::redis::{
    self, AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisResult,
};

use super::StoreConnection;
use crate::cache::error::CacheError;
use crate::core::config::ServerConfig;

/// Connection to a Redis-compatible server
pub struct RedisConnection {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl RedisConnection {
    /// Connect and verify the server answers `PING`
    ///
    /// No retries: a failed attempt is reported with the host and port.
    pub async fn open(server: &ServerConfig) -> Result<Self, CacheError> {
        let timeout = server.timeout_duration()?;
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(server.host.clone(), server.port),
            redis: RedisConnectionInfo::default(),
        };

        let client = Client::open(info)
            .map_err(|e| CacheError::connection(&server.host, server.port, e))?;

        let mut conn = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| {
                CacheError::connection(
                    &server.host,
                    server.port,
                    format!("connect timed out after {timeout:?}"),
                )
            })?
            .map_err(|e| CacheError::connection(&server.host, server.port, e))?;

        tokio::time::timeout(timeout, redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map_err(|_| {
                CacheError::connection(
                    &server.host,
                    server.port,
                    format!("PING timed out after {timeout:?}"),
                )
            })?
            .map_err(|e| {
                CacheError::connection(&server.host, server.port, format!("PING failed: {e}"))
            })?;

        tracing::debug!(
            host = %server.host,
            port = server.port,
            timeout_ms = timeout.as_millis() as u64,
            "Redis connection established"
        );

        Ok(Self { conn, timeout })
    }

    /// Bound a command by the configured timeout
    async fn run<T>(&self, command: impl Future<Output = RedisResult<T>>) -> Result<T, CacheError> {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Operation(format!(
                "command timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        self.run(conn.get(key)).await
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        self.run(
            redis::cmd("SETEX")
                .arg(key)
                .arg(seconds)
                .arg(value)
                .query_async::<()>(&mut conn),
        )
        .await
    }

    async fn ttl(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        self.run(redis::cmd("TTL").arg(key).query_async::<i64>(&mut conn))
            .await
    }

    async fn del(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        self.run(conn.del(key)).await
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        self.run(redis::cmd("FLUSHALL").query_async::<()>(&mut conn))
            .await
    }

    async fn incr_by(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        self.run(
            redis::cmd("INCRBY")
                .arg(key)
                .arg(step)
                .query_async::<i64>(&mut conn),
        )
        .await
    }

    async fn decr_by(&self, key: &str, step: i64) -> Result<i64, CacheError> {
        let mut conn = self.conn.clone();
        self.run(
            redis::cmd("DECRBY")
                .arg(key)
                .arg(step)
                .query_async::<i64>(&mut conn),
        )
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        self.run(conn.exists(key)).await
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        self.run(
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(seconds)
                .query_async::<bool>(&mut conn),
        )
        .await
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        self.run(redis::cmd("PING").query_async::<String>(&mut conn))
            .await
            .map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
