//! Redis Cache - Distributed Cache Backend
//!
//! Values are encoded with a [`CacheCodec`] (JSON by default) and stored as
//! Redis strings. Each pooled connection is a `ConnectionManager`, which
//! multiplexes commands and reconnects automatically.
//!
//! Every network leg is bounded: `dial_timeout` covers connect and the
//! initial `PING`, `read_timeout` covers lookups and `write_timeout` covers
//! mutations. A zero timeout leaves that leg unbounded. Dropping an
//! operation's future cancels its network leg.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::codecs::{JsonCodec, decode_or_raw};
use crate::config::RedisConfig;
use crate::error::CacheError;
use crate::stats::{CacheStats, StatsCounters};
use crate::traits::{CacheBackend, CacheCodec};
use crate::value::CacheValue;

const BACKEND: &str = "Redis";

/// Await `fut`, failing with [`CacheError::Timeout`] after `limit`.
///
/// A zero `limit` waits indefinitely.
async fn bounded<T, E, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    if limit.is_zero() {
        return fut.await.map_err(Into::into);
    }
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(CacheError::Timeout {
            operation,
            timeout: limit,
        }
        .into()),
    }
}

/// Pair pipelined `GET` replies with their keys; nil and non-string replies
/// are misses
fn collect_replies<C: CacheCodec + ?Sized>(
    codec: &C,
    keys: &[&str],
    replies: Vec<Value>,
) -> HashMap<String, CacheValue> {
    keys.iter()
        .zip(replies)
        .filter_map(|(key, reply)| {
            let value = match reply {
                Value::BulkString(bytes) => decode_or_raw(codec, &bytes),
                Value::SimpleString(text) => decode_or_raw(codec, text.as_bytes()),
                _ => return None,
            };
            Some(((*key).to_string(), value))
        })
        .collect()
}

/// Whole milliseconds, rounded up so a non-zero TTL never becomes `PSETEX 0`
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// Redis distributed cache over a small pool of `ConnectionManager`s
///
/// - Per-key TTL with millisecond precision (`PSETEX`)
/// - Pipelined batch operations
/// - Server-side atomic counters (`INCRBY` / `DECRBY`)
/// - Round-robin over `pool_size` multiplexed connections
pub struct RedisCache<C: CacheCodec = JsonCodec> {
    /// `None` once closed
    connections: RwLock<Option<Vec<ConnectionManager>>>,
    next: AtomicUsize,
    codec: C,
    read_timeout: Duration,
    write_timeout: Duration,
    stats: StatsCounters,
}

impl RedisCache<JsonCodec> {
    /// Connect with the JSON codec
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created, a connection cannot
    /// be established, or `PING` fails within `dial_timeout`.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        Self::with_codec(config, JsonCodec).await
    }
}

impl<C: CacheCodec> RedisCache<C> {
    /// Connect with a custom codec
    ///
    /// # Errors
    ///
    /// Same as [`connect`](RedisCache::connect).
    pub async fn with_codec(config: &RedisConfig, codec: C) -> Result<Self> {
        let redis_url = config.redacted_url();
        let pool_size = config.pool_size.max(1);
        info!(
            redis_url = %redis_url,
            pool_size,
            codec = codec.name(),
            "Initializing Redis Cache with ConnectionManager"
        );
        if config.min_idle_conns > 0 || !config.idle_timeout.is_zero() {
            debug!(
                min_idle_conns = config.min_idle_conns,
                idle_timeout = ?config.idle_timeout,
                "Multiplexed connections stay open; idle settings are not applied"
            );
        }

        let client = Client::open(config.connection_url())
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let dial = async {
            let mut connections = Vec::with_capacity(pool_size);
            for _ in 0..pool_size {
                let mut conn = ConnectionManager::new(client.clone())
                    .await
                    .context("Failed to establish Redis connection manager")?;
                let _: String = redis::cmd("PING")
                    .query_async(&mut conn)
                    .await
                    .context("Redis PING health check failed")?;
                connections.push(conn);
            }
            Ok::<_, anyhow::Error>(connections)
        };
        let connections = bounded("CONNECT", config.dial_timeout, dial)
            .await
            .with_context(|| format!("Failed to connect to Redis at {redis_url}"))?;

        info!(redis_url = %redis_url, "Redis Cache connected successfully");

        Ok(Self {
            connections: RwLock::new(Some(connections)),
            next: AtomicUsize::new(0),
            codec,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            stats: StatsCounters::default(),
        })
    }

    /// Next pooled connection, or [`CacheError::Closed`]
    fn connection(&self) -> Result<ConnectionManager> {
        let guard = self.connections.read();
        let connections = guard.as_ref().ok_or(CacheError::Closed(BACKEND))?;
        let index = self
            .next
            .fetch_add(1, Ordering::Relaxed)
            .checked_rem(connections.len())
            .unwrap_or(0);
        connections
            .get(index)
            .cloned()
            .ok_or_else(|| CacheError::Closed(BACKEND).into())
    }

    fn encode(&self, key: &str, value: &CacheValue) -> Result<Vec<u8>> {
        self.codec
            .serialize(value)
            .with_context(|| format!("Failed to encode value for key '{key}'"))
    }

    async fn fetch(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut conn = self.connection()?;
        let raw: Option<Vec<u8>> = bounded("GET", self.read_timeout, conn.get(key)).await?;
        Ok(raw.map(|bytes| decode_or_raw(&self.codec, &bytes)))
    }

    /// Remaining TTL; zero when the key has no expiry or `PTTL` fails
    async fn remaining_ttl(&self, key: &str) -> Duration {
        let pttl: Result<i64> = match self.connection() {
            Ok(mut conn) => {
                bounded(
                    "PTTL",
                    self.read_timeout,
                    redis::cmd("PTTL").arg(key).query_async(&mut conn),
                )
                .await
            }
            Err(e) => Err(e),
        };
        match pttl {
            Ok(ms) if ms > 0 => Duration::from_millis(ms.unsigned_abs()),
            Ok(_) => Duration::ZERO,
            Err(e) => {
                debug!(key = %key, error = %e, "[Redis] PTTL failed; reporting no expiry");
                Duration::ZERO
            }
        }
    }
}

#[async_trait]
impl<C: CacheCodec + 'static> CacheBackend for RedisCache<C> {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        match self.fetch(key).await {
            Ok(Some(value)) => {
                self.stats.record_hit();
                Some(value)
            }
            Ok(None) => {
                self.stats.record_miss();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "[Redis] GET failed; reporting miss");
                self.stats.record_miss();
                None
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        let payload = self.encode(key, &value)?;
        let mut conn = self.connection()?;

        if ttl.is_zero() {
            let () = bounded("SET", self.write_timeout, conn.set(key, payload)).await?;
        } else {
            let () = bounded(
                "PSETEX",
                self.write_timeout,
                redis::cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_millis(ttl))
                    .arg(payload)
                    .query_async(&mut conn),
            )
            .await?;
        }

        self.stats.record_set();
        debug!(key = %key, ttl = ?ttl, "[Redis] Cached key with TTL");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection()?;
        let _: i64 = bounded("DEL", self.write_timeout, conn.del(key)).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let () = bounded(
            "FLUSHDB",
            self.write_timeout,
            redis::cmd("FLUSHDB").query_async(&mut conn),
        )
        .await?;
        info!("[Redis] Flushed database");
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        let Ok(mut conn) = self.connection() else {
            return false;
        };
        match bounded("EXISTS", self.read_timeout, conn.exists(key)).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "[Redis] EXISTS failed; reporting absent");
                false
            }
        }
    }

    async fn get_multi(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        if keys.is_empty() {
            return HashMap::new();
        }
        let mut conn = match self.connection() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "[Redis] Batch GET skipped");
                return HashMap::new();
            }
        };

        // Per-command errors come back as `Value::ServerError` and are skipped.
        let mut pipe = redis::pipe();
        pipe.ignore_errors();
        for key in keys {
            pipe.cmd("GET").arg(*key);
        }
        let replies: Vec<Value> =
            match bounded("GET pipeline", self.read_timeout, pipe.query_async(&mut conn)).await {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(count = keys.len(), error = %e, "[Redis] Batch GET failed; reporting misses");
                    return HashMap::new();
                }
            };

        let found = collect_replies(&self.codec, keys, replies);
        self.stats
            .record_lookups(found.len(), keys.len().saturating_sub(found.len()));
        found
    }

    async fn set_multi(&self, items: HashMap<String, CacheValue>, ttl: Duration) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in &items {
            let payload = self.encode(key, value)?;
            if ttl.is_zero() {
                pipe.cmd("SET").arg(key).arg(payload).ignore();
            } else {
                pipe.cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_millis(ttl))
                    .arg(payload)
                    .ignore();
            }
        }

        let mut conn = self.connection()?;
        let () = bounded("SET pipeline", self.write_timeout, pipe.query_async(&mut conn)).await?;

        self.stats.record_sets(items.len());
        debug!(count = items.len(), ttl = ?ttl, "[Redis] Cached batch");
        Ok(())
    }

    async fn delete_multi(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("DEL").arg(*key).ignore();
        }

        let mut conn = self.connection()?;
        let () = bounded("DEL pipeline", self.write_timeout, pipe.query_async(&mut conn)).await?;
        debug!(count = keys.len(), "[Redis] Removed keys in bulk");
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection()?;
        let value = bounded("INCRBY", self.write_timeout, conn.incr(key, delta))
            .await
            .with_context(|| format!("Failed to increment key '{key}'"))?;
        Ok(value)
    }

    async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection()?;
        let value = bounded("DECRBY", self.write_timeout, conn.decr(key, delta))
            .await
            .with_context(|| format!("Failed to decrement key '{key}'"))?;
        Ok(value)
    }

    async fn get_with_ttl(&self, key: &str) -> Option<(CacheValue, Duration)> {
        let value = self.get(key).await?;
        let ttl = self.remaining_ttl(key).await;
        Some((value, ttl))
    }

    async fn close(&self) -> Result<()> {
        let closed = self.connections.write().take();
        if let Some(connections) = closed {
            info!(connections = connections.len(), "Redis Cache closed");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let Ok(mut conn) = self.connection() else {
            return false;
        };
        let pong: Result<String> = bounded(
            "PING",
            self.read_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await;
        pong.is_ok()
    }

    fn name(&self) -> &'static str {
        BACKEND
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(None)
    }
}
