//! Layered Cache - L1 in front of L2
//!
//! An in-process [`LruCache`] answers hot reads; a shared backend (usually
//! Redis) is the source of truth.
//!
//! - Reads try L1, then L2, and backfill L1 on an L2 hit
//! - Writes go to L2 first and reach L1 only if L2 accepted them
//! - Removals go to L1 first, then L2
//! - Counters are computed by L2 and mirrored into L1
//!
//! There is no cross-tier transaction: a failure between the L2 and L1 writes
//! leaves L1 stale until its entry expires. L1 is per process, so other
//! processes' writes are only seen once the local copy expires.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backends::LruCache;
use crate::stats::{CacheStats, LayeredStats};
use crate::traits::CacheBackend;
use crate::value::CacheValue;

/// Two-level cache: [`LruCache`] L1 over any [`CacheBackend`] L2
pub struct LayeredCache {
    l1: Arc<LruCache>,
    l2: Arc<dyn CacheBackend>,
    total_requests: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    misses: AtomicU64,
    backfills: AtomicU64,
}

impl LayeredCache {
    #[must_use]
    pub fn new(l1: Arc<LruCache>, l2: Arc<dyn CacheBackend>) -> Self {
        info!(
            l1 = l1.name(),
            l2 = l2.name(),
            l1_default_ttl = ?l1.default_ttl(),
            "Layered Cache initialized"
        );
        Self {
            l1,
            l2,
            total_requests: AtomicU64::new(0),
            l1_hits: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            backfills: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn l1(&self) -> &Arc<LruCache> {
        &self.l1
    }

    #[must_use]
    pub fn l2(&self) -> &Arc<dyn CacheBackend> {
        &self.l2
    }

    /// Per-tier hit counters
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn layered_stats(&self) -> LayeredStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let hit_rate = if total_requests > 0 {
            ((l1_hits + l2_hits) as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        LayeredStats {
            total_requests,
            l1_hits,
            l2_hits,
            misses: self.misses.load(Ordering::Relaxed),
            backfills: self.backfills.load(Ordering::Relaxed),
            hit_rate,
        }
    }

    /// L1 TTL for a write: the caller's TTL capped by L1's default
    fn l1_ttl(&self, ttl: Duration) -> Duration {
        let default = self.l1.default_ttl();
        if ttl.is_zero() {
            default
        } else if default.is_zero() {
            ttl
        } else {
            ttl.min(default)
        }
    }

    /// Copy an L2 hit into L1 with L1's default TTL
    async fn backfill(&self, key: &str, value: CacheValue) {
        match self.l1.set(key, value, self.l1.default_ttl()).await {
            Ok(()) => {
                self.backfills.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "[Layered] Backfilled L2 hit into L1");
            }
            Err(e) => warn!(key = %key, error = %e, "[Layered] Failed to backfill L1"),
        }
    }

    /// Mirror an L2 counter result into L1
    async fn mirror_counter(&self, key: &str, value: i64) {
        if let Err(e) = self
            .l1
            .set(key, CacheValue::Int(value), self.l1.default_ttl())
            .await
        {
            warn!(key = %key, error = %e, "[Layered] Failed to mirror counter into L1");
        }
    }
}

#[async_trait]
impl CacheBackend for LayeredCache {
    async fn get(&self, key: &str) -> Option<CacheValue> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(value) = self.l1.get(key).await {
            self.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        if let Some(value) = self.l2.get(key).await {
            self.l2_hits.fetch_add(1, Ordering::Relaxed);
            self.backfill(key, value.clone()).await;
            return Some(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        self.l2
            .set(key, value.clone(), ttl)
            .await
            .with_context(|| format!("L2 write failed for key '{key}'"))?;
        self.l1.set(key, value, self.l1_ttl(ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.l1.delete(key).await?;
        self.l2
            .delete(key)
            .await
            .with_context(|| format!("L2 delete failed for key '{key}'"))
    }

    async fn clear(&self) -> Result<()> {
        self.l1.clear().await?;
        self.l2.clear().await.context("L2 clear failed")
    }

    async fn exists(&self, key: &str) -> bool {
        self.l1.exists(key).await || self.l2.exists(key).await
    }

    async fn get_multi(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        let mut found = self.l1.get_multi(keys).await;
        let l1_found = found.len() as u64;

        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| !found.contains_key(*key))
            .collect();

        let mut l2_found = 0;
        if !missing.is_empty() {
            let from_l2 = self.l2.get_multi(&missing).await;
            if !from_l2.is_empty() {
                l2_found = from_l2.len() as u64;
                match self
                    .l1
                    .set_multi(from_l2.clone(), self.l1.default_ttl())
                    .await
                {
                    Ok(()) => {
                        self.backfills.fetch_add(l2_found, Ordering::Relaxed);
                    }
                    Err(e) => warn!(count = l2_found, error = %e, "[Layered] Failed to backfill L1 batch"),
                }
                found.extend(from_l2);
            }
        }

        let requested = keys.len() as u64;
        self.total_requests.fetch_add(requested, Ordering::Relaxed);
        self.l1_hits.fetch_add(l1_found, Ordering::Relaxed);
        self.l2_hits.fetch_add(l2_found, Ordering::Relaxed);
        self.misses.fetch_add(
            requested.saturating_sub(l1_found + l2_found),
            Ordering::Relaxed,
        );
        found
    }

    async fn set_multi(&self, items: HashMap<String, CacheValue>, ttl: Duration) -> Result<()> {
        self.l2
            .set_multi(items.clone(), ttl)
            .await
            .context("L2 batch write failed")?;
        self.l1.set_multi(items, self.l1_ttl(ttl)).await
    }

    async fn delete_multi(&self, keys: &[&str]) -> Result<()> {
        self.l1.delete_multi(keys).await?;
        self.l2
            .delete_multi(keys)
            .await
            .context("L2 batch delete failed")
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.l2.increment(key, delta).await?;
        self.mirror_counter(key, value).await;
        Ok(value)
    }

    async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let value = self.l2.decrement(key, delta).await?;
        self.mirror_counter(key, value).await;
        Ok(value)
    }

    async fn get_with_ttl(&self, key: &str) -> Option<(CacheValue, Duration)> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(hit) = self.l1.get_with_ttl(key).await {
            self.l1_hits.fetch_add(1, Ordering::Relaxed);
            return Some(hit);
        }

        if let Some((value, ttl)) = self.l2.get_with_ttl(key).await {
            self.l2_hits.fetch_add(1, Ordering::Relaxed);
            self.backfill(key, value.clone()).await;
            return Some((value, ttl));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn close(&self) -> Result<()> {
        let l1 = self.l1.close().await;
        let l2 = self.l2.close().await;
        info!("Layered Cache closed");
        l1.and(l2)
    }

    async fn health_check(&self) -> bool {
        let l1 = self.l1.health_check().await;
        let l2 = self.l2.health_check().await;
        if !(l1 && l2) {
            warn!(l1, l2, "[Layered] Health check failed");
        }
        l1 && l2
    }

    fn name(&self) -> &'static str {
        "Layered"
    }

    fn stats(&self) -> CacheStats {
        let layered = self.layered_stats();
        CacheStats {
            hits: layered.l1_hits + layered.l2_hits,
            misses: layered.misses,
            size: Some(self.l1.len()),
            ..CacheStats::default()
        }
    }
}
