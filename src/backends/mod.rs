//! Cache Backend Implementations
//!
//! # Available Backends
//!
//! ## In-Process
//! - **LRU** - Capacity-bounded map with LRU eviction and an expiry sweep
//!   (always available; also the L1 of [`LayeredCache`](crate::LayeredCache))
//! - **Moka** - Concurrent expiring map with per-key TTL (feature: `moka`)
//!
//! ## Distributed
//! - **Redis** - Shared cache over pooled `ConnectionManager`s (feature: `redis`)
//!
//! # Usage
//!
//! ```rust,no_run
//! use tiered_cache::backends::{LruCache, MokaCache, RedisCache};
//! use tiered_cache::config::{LocalConfig, RedisConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let lru = LruCache::new(&LocalConfig::default())?;
//! let moka = MokaCache::new(&LocalConfig::default())?;
//! let redis = RedisCache::connect(&RedisConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod lru_cache;

#[cfg(feature = "moka")]
pub mod moka_cache;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use lru_cache::LruCache;

#[cfg(feature = "moka")]
pub use moka_cache::MokaCache;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;
