//! Moka Cache - In-Memory Expiring Backend
//!
//! Wraps `moka::future::Cache` with a per-entry expiry policy, so every key
//! carries its own TTL. There is no capacity bound: use
//! [`LruCache`](crate::LruCache) when memory must be capped.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use parking_lot::Mutex;
use std::future::ready;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backends::lru_cache::expiry_for;
use crate::config::LocalConfig;
use crate::error::CacheError;
use crate::stats::{CacheStats, StatsCounters};
use crate::sweeper::SweepHandle;
use crate::traits::CacheBackend;
use crate::value::CacheValue;

/// Cache entry with TTL information
#[derive(Debug, Clone)]
struct MokaEntry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl MokaEntry {
    fn new(value: CacheValue, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            expires_at: expiry_for(ttl, now),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at
            .map_or(Duration::ZERO, |expires_at| expires_at.saturating_duration_since(now))
    }
}

/// Expiry policy reading each entry's own deadline
struct EntryExpiry;

impl EntryExpiry {
    fn until(entry: &MokaEntry, now: Instant) -> Option<Duration> {
        entry
            .expires_at
            .map(|expires_at| expires_at.saturating_duration_since(now))
    }
}

impl Expiry<String, MokaEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &MokaEntry, created_at: Instant) -> Option<Duration> {
        Self::until(value, created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MokaEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Self::until(value, updated_at)
    }
}

/// Moka in-memory cache with per-key TTL support
///
/// - Lock-free concurrent reads and writes
/// - Per-key TTL via a custom expiry policy
/// - Atomic per-key `increment`
/// - Periodic maintenance so idle caches still drop expired entries
pub struct MokaCache {
    cache: Cache<String, MokaEntry>,
    default_ttl: Duration,
    stats: Arc<StatsCounters>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl MokaCache {
    /// Create new Moka cache
    ///
    /// `config.max_size` is ignored; `default_expiration` applies to counters
    /// created by `increment` and `cleanup_interval` paces maintenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be initialized.
    pub fn new(config: &LocalConfig) -> Result<Self> {
        info!("Initializing Moka Cache");

        let stats = Arc::new(StatsCounters::default());
        let listener_stats = Arc::clone(&stats);
        let cache = Cache::builder()
            .expire_after(EntryExpiry)
            .eviction_listener(move |_key, _value, cause| match cause {
                RemovalCause::Expired => listener_stats.record_expirations(1),
                RemovalCause::Size => listener_stats.record_eviction(),
                _ => {}
            })
            .build();

        let sweep_cache = cache.clone();
        let sweeper = SweepHandle::spawn("Moka", config.cleanup_interval, move || {
            let cache = sweep_cache.clone();
            async move {
                let before = cache.entry_count();
                cache.run_pending_tasks().await;
                usize::try_from(before.saturating_sub(cache.entry_count())).unwrap_or(usize::MAX)
            }
        });

        info!(
            default_ttl = ?config.default_expiration,
            cleanup_interval = ?config.cleanup_interval,
            "Moka Cache initialized with per-key TTL support"
        );

        Ok(Self {
            cache,
            default_ttl: config.default_expiration,
            stats,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Approximate number of entries; pending maintenance may lag behind
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions and expirations now
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    async fn live_entry(&self, key: &str, now: Instant) -> Option<MokaEntry> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired(now) => {
                self.cache.invalidate(key).await;
                self.stats.record_expirations(1);
                None
            }
            found => found,
        }
    }
}

#[async_trait]
impl CacheBackend for MokaCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        if let Some(entry) = self.live_entry(key, Instant::now()).await {
            self.stats.record_hit();
            Some(entry.value)
        } else {
            self.stats.record_miss();
            None
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        let entry = MokaEntry::new(value, ttl, Instant::now());
        self.cache.insert(key.to_string(), entry).await;
        self.stats.record_set();
        debug!(key = %key, ttl = ?ttl, "[Moka] Cached key with TTL");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        debug!("[Moka] Invalidated all entries");
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.live_entry(key, Instant::now()).await.is_some()
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let now = Instant::now();
        let default_ttl = self.default_ttl;
        let mut rejected = None;

        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|current| {
                let op = match current.map(|entry| entry.into_value()) {
                    Some(entry) if !entry.is_expired(now) => {
                        let next = match entry.value.as_counter() {
                            Some(base) => base.checked_add(delta),
                            None => {
                                warn!(key = %key, "[Moka] Replacing non-numeric value with counter");
                                Some(delta)
                            }
                        };
                        match next {
                            Some(next) => Op::Put(MokaEntry {
                                value: CacheValue::Int(next),
                                expires_at: entry.expires_at,
                            }),
                            None => {
                                rejected = Some(CacheError::Overflow(key.to_string()));
                                Op::Nop
                            }
                        }
                    }
                    _ => Op::Put(MokaEntry::new(CacheValue::Int(delta), default_ttl, now)),
                };
                ready(op)
            })
            .await;

        if let Some(err) = rejected {
            return Err(err.into());
        }

        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => {
                self.stats.record_set();
                entry
                    .into_value()
                    .value
                    .as_i64()
                    .ok_or_else(|| anyhow!("Counter at '{key}' was not stored as an integer"))
            }
            _ => Err(anyhow!("Counter update for '{key}' did not store a value")),
        }
    }

    async fn get_with_ttl(&self, key: &str) -> Option<(CacheValue, Duration)> {
        let now = Instant::now();
        let entry = self.live_entry(key, now).await?;
        let ttl = entry.remaining_ttl(now);
        Some((entry.value, ttl))
    }

    async fn close(&self) -> Result<()> {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            info!("Moka Cache closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Moka"
    }

    fn stats(&self) -> CacheStats {
        let size = usize::try_from(self.cache.entry_count()).ok();
        self.stats.snapshot(size)
    }
}
