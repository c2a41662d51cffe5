//! Entries and LRU ordering for the in-process LRU store.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::value::CacheValue;

/// Absolute expiry for a TTL, `None` when the entry never expires
pub(crate) fn expiry_for(ttl: Duration, now: Instant) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        now.checked_add(ttl)
    }
}

/// A stored value with its expiry and position in the LRU order
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: CacheValue,
    pub(crate) expires_at: Option<Instant>,
    pub(crate) last_access: Instant,
    /// Key of this entry in [`LruIndex`]
    pub(crate) tick: u64,
}

impl Entry {
    /// Expired once `now` reaches `expires_at`
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Time left before expiry; zero for entries without expiry
    pub(crate) fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at
            .map_or(Duration::ZERO, |expires_at| expires_at.saturating_duration_since(now))
    }
}

/// Access order of live keys.
///
/// Every use stamps the key with a fresh, strictly increasing tick, so the
/// smallest tick is the least recently used key (head) and the largest is the
/// most recently used (tail).
#[derive(Debug, Default)]
pub(crate) struct LruIndex {
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl LruIndex {
    /// Append `key` at the tail and return its tick
    pub(crate) fn push_back(&mut self, key: String) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        self.order.insert(tick, key);
        tick
    }

    /// Move the key at `tick` to the tail and return its new tick
    pub(crate) fn touch(&mut self, tick: u64) -> u64 {
        match self.order.remove(&tick) {
            Some(key) => self.push_back(key),
            None => tick,
        }
    }

    pub(crate) fn remove(&mut self, tick: u64) -> Option<String> {
        self.order.remove(&tick)
    }

    /// Remove and return the least recently used key
    pub(crate) fn pop_front(&mut self) -> Option<String> {
        self.order.pop_first().map(|(_, key)| key)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
    }

    /// Keys from least to most recently used
    pub(crate) fn keys(&self) -> impl Iterator<Item = (&u64, &String)> {
        self.order.iter()
    }
}
