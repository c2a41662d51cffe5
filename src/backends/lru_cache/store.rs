//! Synchronous core of the LRU store.
//!
//! Holds the key→entry map and the [`LruIndex`] together; the async wrapper
//! keeps one of these behind a single mutex. Every method takes `now`
//! explicitly so expiry is deterministic under test.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::index::{Entry, LruIndex, expiry_for};
use crate::error::CacheError;
use crate::stats::StatsCounters;
use crate::value::CacheValue;

#[derive(Debug)]
pub(crate) struct LruStore {
    entries: HashMap<String, Entry>,
    index: LruIndex,
    max_size: usize,
    stats: Arc<StatsCounters>,
}

/// Live entry for `key`, moved to the tail of the LRU order.
///
/// An expired entry is removed and reported as absent.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    index: &mut LruIndex,
    stats: &StatsCounters,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key)?.is_expired(now) {
        if let Some(expired) = entries.remove(key) {
            index.remove(expired.tick);
        }
        stats.record_expirations(1);
        return None;
    }
    let entry = entries.get_mut(key)?;
    entry.tick = index.touch(entry.tick);
    entry.last_access = now;
    Some(entry)
}

impl LruStore {
    pub(crate) fn new(max_size: usize, stats: Arc<StatsCounters>) -> Self {
        Self {
            entries: HashMap::new(),
            index: LruIndex::default(),
            max_size,
            stats,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Look up a live entry, counting a hit or a miss
    pub(crate) fn get(&mut self, key: &str, now: Instant) -> Option<&Entry> {
        let Self {
            entries,
            index,
            stats,
            ..
        } = self;
        let found = live_entry(entries, index, stats, key, now);
        if found.is_some() {
            stats.record_hit();
        } else {
            stats.record_miss();
        }
        found.map(|entry| &*entry)
    }

    /// Whether a live entry exists. Does not reorder or count a lookup.
    pub(crate) fn contains(&mut self, key: &str, now: Instant) -> bool {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };
        if expired {
            self.remove(key);
            self.stats.record_expirations(1);
        }
        !expired
    }

    /// Insert at the tail, evicting the head first when at capacity.
    ///
    /// Returns the evicted key, if any.
    pub(crate) fn insert(
        &mut self,
        key: String,
        value: CacheValue,
        expires_at: Option<Instant>,
        now: Instant,
    ) -> Option<String> {
        self.remove(&key);

        let mut evicted = None;
        if self.entries.len() >= self.max_size {
            if let Some(oldest) = self.index.pop_front() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
                debug!(key = %oldest, "[LRU] Evicted least recently used key");
                evicted = Some(oldest);
            }
        }

        let tick = self.index.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                last_access: now,
                tick,
            },
        );
        self.stats.record_set();
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.index.remove(entry.tick);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Drop every expired entry and return how many were removed
    pub(crate) fn purge_expired(&mut self, now: Instant) -> usize {
        let Self { entries, index, .. } = self;
        let before = entries.len();
        entries.retain(|_, entry| {
            if entry.is_expired(now) {
                index.remove(entry.tick);
                false
            } else {
                true
            }
        });
        let removed = before - entries.len();
        self.stats.record_expirations(removed);
        removed
    }

    /// Add `delta` to the counter at `key`.
    ///
    /// An absent key starts at `delta` with `default_ttl`. A present key keeps
    /// its expiry; a non-numeric value is replaced by `delta`.
    pub(crate) fn increment(
        &mut self,
        key: &str,
        delta: i64,
        default_ttl: Duration,
        now: Instant,
    ) -> Result<i64, CacheError> {
        let Self {
            entries,
            index,
            stats,
            ..
        } = self;

        if let Some(entry) = live_entry(entries, index, stats, key, now) {
            let next = match entry.value.as_counter() {
                Some(base) => base
                    .checked_add(delta)
                    .ok_or_else(|| CacheError::Overflow(key.to_string()))?,
                None => {
                    warn!(key = %key, "[LRU] Replacing non-numeric value with counter");
                    delta
                }
            };
            entry.value = CacheValue::Int(next);
            stats.record_set();
            return Ok(next);
        }

        self.insert(
            key.to_string(),
            CacheValue::Int(delta),
            expiry_for(default_ttl, now),
            now,
        );
        Ok(delta)
    }

    /// Panics unless map and index are a bijection within capacity
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert!(self.entries.len() <= self.max_size, "capacity exceeded");
        assert_eq!(self.entries.len(), self.index.len(), "map/index size mismatch");
        for (tick, key) in self.index.keys() {
            let entry = self.entries.get(key).unwrap_or_else(|| panic!("indexed key {key} missing"));
            assert_eq!(entry.tick, *tick, "tick mismatch for {key}");
        }
    }

    /// Keys from least to most recently used
    #[cfg(test)]
    pub(crate) fn lru_order(&self) -> Vec<String> {
        self.index.keys().map(|(_, key)| key.clone()).collect()
    }
}
