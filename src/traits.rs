//! Cache Backend Traits
//!
//! This module defines the contract every cache implementation satisfies and
//! the serialization abstraction used by remote backends.
//!
//! # Architecture
//!
//! - `CacheBackend`: Core trait for all cache implementations
//! - `CacheBackendExt`: Typed helpers available on every backend
//! - `CacheCodec`: Trait for pluggable serialization backends
//!
//! # Example: Custom Backend
//!
//! Only the single-key operations are required. Batch operations,
//! `decrement` and `health_check` have default implementations built on them.
//!
//! ```rust,ignore
//! use tiered_cache::{CacheBackend, CacheValue, async_trait};
//! use std::time::Duration;
//! use anyhow::Result;
//!
//! struct MyCustomCache {
//!     // Your implementation
//! }
//!
//! #[async_trait]
//! impl CacheBackend for MyCustomCache {
//!     async fn get(&self, key: &str) -> Option<CacheValue> {
//!         // Your implementation
//!     }
//!
//!     async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
//!         // Your implementation
//!     }
//!
//!     // ... delete, clear, exists, increment, get_with_ttl, close
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

use crate::error::CacheError;
use crate::stats::CacheStats;
use crate::value::CacheValue;

/// Trait for cache value serialization/deserialization
///
/// Remote backends store bytes; a codec turns values into those bytes and
/// back.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync + Debug` to support concurrent access
/// across async tasks.
pub trait CacheCodec: Send + Sync + Debug {
    /// Serialize a value to bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented in this format.
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize bytes to a value
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not valid for this format.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;

    /// Name of the codec, for logging
    fn name(&self) -> &'static str;
}

/// Core cache backend contract
///
/// Every backend (in-process LRU, Moka, Redis, and the layered composition)
/// implements this trait, and callers only ever hold a `dyn CacheBackend`.
///
/// # Lookups never fail
///
/// `get`, `exists`, `get_multi` and `get_with_ttl` fold absence, expiry and
/// backend failure into a miss. Mutations return errors.
///
/// # TTL
///
/// A `ttl` of [`Duration::ZERO`] means the entry never expires.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to support concurrent access across
/// async tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get value from cache by key
    ///
    /// # Returns
    ///
    /// * `Some(value)` - Live entry found
    /// * `None` - Key absent, expired, or backend unavailable
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store a value with a time-to-live (`Duration::ZERO` = no expiration)
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write (network,
    /// serialization, closed backend).
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key held by this backend
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn clear(&self) -> Result<()>;

    /// Whether a live (non-expired) entry exists for `key`
    async fn exists(&self, key: &str) -> bool;

    /// Get several keys at once. Misses are absent from the returned map.
    async fn get_multi(&self, keys: &[&str]) -> HashMap<String, CacheValue> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await {
                found.insert((*key).to_string(), value);
            }
        }
        found
    }

    /// Store several entries with one shared TTL
    ///
    /// # Errors
    ///
    /// Returns the first write failure.
    async fn set_multi(&self, items: HashMap<String, CacheValue>, ttl: Duration) -> Result<()> {
        for (key, value) in items {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    /// Remove several keys at once
    ///
    /// # Errors
    ///
    /// Returns the first delete failure.
    async fn delete_multi(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }

    /// Add `delta` to the integer stored at `key` and return the new value.
    ///
    /// An absent key is initialized to `delta`.
    ///
    /// # Errors
    ///
    /// Returns an error on overflow, backend failure, or (backend-dependent)
    /// when the stored value is not numeric.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Subtract `delta`; an absent key is initialized to `-delta`.
    ///
    /// # Errors
    ///
    /// Same as [`increment`](Self::increment).
    async fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let negated = delta
            .checked_neg()
            .ok_or_else(|| CacheError::Overflow(key.to_string()))?;
        self.increment(key, negated).await
    }

    /// Get a value together with its remaining TTL.
    ///
    /// The TTL is `Duration::ZERO` when the entry has no expiration.
    async fn get_with_ttl(&self, key: &str) -> Option<(CacheValue, Duration)>;

    /// Release resources and stop background work. Calling it twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if a background task failed to shut down cleanly.
    async fn close(&self) -> Result<()>;

    /// Check if the backend is operational with a write/read/delete round trip
    async fn health_check(&self) -> bool {
        let check_key = format!("health_check_{}", self.name().to_lowercase());
        let check_value = CacheValue::from("ok");

        if self
            .set(&check_key, check_value.clone(), Duration::from_secs(10))
            .await
            .is_err()
        {
            return false;
        }
        let healthy = self.get(&check_key).await.as_ref() == Some(&check_value);
        let _ = self.delete(&check_key).await;
        healthy
    }

    /// Name of this backend, for logging
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Snapshot of this backend's counters
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Typed helpers over any [`CacheBackend`]
///
/// Values go through `serde_json`, so anything `Serialize` becomes a
/// [`CacheValue`] scalar or document.
///
/// ```rust,no_run
/// use tiered_cache::{CacheBackendExt, LruCache};
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let cache = LruCache::with_capacity(100)?;
/// cache.set_typed("user:1", &vec!["alice", "bob"], Duration::from_secs(60)).await?;
/// let names: Option<Vec<String>> = cache.get_typed("user:1").await;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait CacheBackendExt: CacheBackend {
    /// Get and deserialize a value. A value of the wrong shape is a miss.
    async fn get_typed<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value.to_json()) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key = %key, error = %e, "Cached value does not match requested type");
                None
            }
        }
    }

    /// Serialize and store a value
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    async fn set_typed<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize value for key '{key}'"))?;
        self.set(key, CacheValue::from_untagged(json), ttl).await
    }
}

impl<B: CacheBackend + ?Sized> CacheBackendExt for B {}
