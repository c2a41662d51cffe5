//! Tiered Cache
//!
//! A backend-agnostic caching library for Rust featuring:
//! - **LRU Cache**: In-process, capacity-bounded, with a background expiry sweep
//! - **Moka Cache**: In-process concurrent expiring map with per-key TTL
//! - **Redis Cache**: Shared distributed cache with pipelined batches
//! - **Layered Cache**: LRU L1 in front of a shared L2, with backfill on L2 hits
//! - **One Contract**: every backend is used through `Arc<dyn CacheBackend>`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tiered_cache::{CacheConfig, CacheOptions, CacheValue, new_cache};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::from_env()?;
//!     let options = CacheOptions::from_env()?;
//!     let cache = new_cache(&config, Some(&options)).await?;
//!
//!     cache.set("user:1", CacheValue::from("alice"), Duration::from_secs(300)).await?;
//!     if let Some(cached) = cache.get("user:1").await {
//!         tracing::info!(?cached, "Cache hit");
//!     }
//!
//!     let visits = cache.increment("visits", 1).await?;
//!     tracing::info!(visits, "Counter updated");
//!
//!     cache.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! get:  L1 (LRU) ──miss──▶ L2 (Redis) ──miss──▶ None
//!          ▲                  │ hit
//!          └──── backfill ────┘
//! set:  L2 first, then L1 (TTL capped by L1's default)
//! ```
//!
//! # Errors
//!
//! Lookups (`get`, `exists`, `get_multi`, `get_with_ttl`) never fail: backend
//! trouble is a miss. Mutations return [`anyhow::Result`]; typed failures are
//! [`CacheError`] values reachable with `downcast_ref`.

pub mod backends;
pub mod builder;
pub mod codecs;
pub mod config;
pub mod error;
pub mod layered;
pub mod stats;
mod sweeper;
pub mod traits;
pub mod value;

pub use backends::LruCache;

#[cfg(feature = "moka")]
pub use backends::MokaCache;

#[cfg(feature = "redis")]
pub use backends::RedisCache;

pub use builder::{CacheBuilder, new_cache};
pub use codecs::JsonCodec;
pub use config::{BackendKind, CacheConfig, CacheOptions, LocalConfig, RedisConfig};
pub use error::CacheError;
pub use layered::LayeredCache;
pub use stats::{CacheStats, LayeredStats};
pub use traits::{CacheBackend, CacheBackendExt, CacheCodec};
pub use value::CacheValue;

// Re-export async_trait for user convenience
pub use async_trait::async_trait;
