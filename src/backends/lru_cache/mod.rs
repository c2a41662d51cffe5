//! LRU Cache - In-Process Capacity-Bounded Backend
//!
//! A hash map paired with an access-ordered index, bounded by `max_size`.
//! Reads move keys to the most-recently-used end; inserting a new key at
//! capacity evicts the least recently used one first.
//!
//! Expired entries are dropped lazily on access and periodically by a
//! background sweep, so keys that are never read again still free memory.
//! The sweep is owned by the cache and stopped by [`close`](CacheBackend::close).

mod index;
mod store;

pub(crate) use self::index::expiry_for;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use self::store::LruStore;
use crate::config::LocalConfig;
use crate::error::CacheError;
use crate::stats::{CacheStats, StatsCounters};
use crate::sweeper::SweepHandle;
use crate::traits::CacheBackend;
use crate::value::CacheValue;

/// In-process LRU cache with per-key TTL
///
/// All operations go through one mutex guarding the map and the LRU order;
/// it is never held across an `.await`.
pub struct LruCache {
    store: Arc<Mutex<LruStore>>,
    max_size: usize,
    default_ttl: Duration,
    stats: Arc<StatsCounters>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl LruCache {
    /// Create a new LRU cache and start its expiry sweep
    ///
    /// The sweep needs a Tokio runtime; outside one, entries still expire
    /// on access.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if `max_size` is zero.
    pub fn new(config: &LocalConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "LRU cache max_size must be greater than zero".to_string(),
            )
            .into());
        }

        let stats = Arc::new(StatsCounters::default());
        let store = Arc::new(Mutex::new(LruStore::new(
            config.max_size,
            Arc::clone(&stats),
        )));

        let sweep_store = Arc::clone(&store);
        let sweeper = SweepHandle::spawn("LRU", config.cleanup_interval, move || {
            let removed = sweep_store.lock().purge_expired(Instant::now());
            std::future::ready(removed)
        });

        info!(
            max_size = config.max_size,
            default_ttl = ?config.default_expiration,
            cleanup_interval = ?config.cleanup_interval,
            "LRU Cache initialized"
        );

        Ok(Self {
            store,
            max_size: config.max_size,
            default_ttl: config.default_expiration,
            stats,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Create a cache of `max_size` entries with the remaining settings at
    /// their defaults
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if `max_size` is zero.
    pub fn with_capacity(max_size: usize) -> Result<Self> {
        Self::new(&LocalConfig {
            max_size,
            ..LocalConfig::default()
        })
    }

    /// Number of stored entries, including expired ones not yet swept
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// TTL given to counters created by `increment`
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Remove every expired entry now and return how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.store.lock().purge_expired(Instant::now())
    }
}

#[async_trait]
impl CacheBackend for LruCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        self.store
            .lock()
            .get(key, Instant::now())
            .map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        self.store
            .lock()
            .insert(key.to_string(), value, expiry_for(ttl, now), now);
        debug!(key = %key, ttl = ?ttl, "[LRU] Cached key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.store.lock().clear();
        debug!("[LRU] Cleared all entries");
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        self.store.lock().contains(key, Instant::now())
    }

    async fn get_multi(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        let now = Instant::now();
        let mut store = self.store.lock();
        keys.iter()
            .filter_map(|key| {
                store
                    .get(key, now)
                    .map(|entry| ((*key).to_string(), entry.value.clone()))
            })
            .collect()
    }

    async fn set_multi(&self, items: HashMap<String, CacheValue>, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = expiry_for(ttl, now);
        let count = items.len();
        {
            let mut store = self.store.lock();
            for (key, value) in items {
                store.insert(key, value, expires_at, now);
            }
        }
        debug!(count, ttl = ?ttl, "[LRU] Cached batch");
        Ok(())
    }

    async fn delete_multi(&self, keys: &[&str]) -> Result<()> {
        let mut store = self.store.lock();
        for key in keys {
            store.remove(key);
        }
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self
            .store
            .lock()
            .increment(key, delta, self.default_ttl, Instant::now())?;
        Ok(value)
    }

    async fn get_with_ttl(&self, key: &str) -> Option<(CacheValue, Duration)> {
        let now = Instant::now();
        self.store
            .lock()
            .get(key, now)
            .map(|entry| (entry.value.clone(), entry.remaining_ttl(now)))
    }

    async fn close(&self) -> Result<()> {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
            info!("LRU Cache closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LRU"
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(Some(self.len()))
    }
}
