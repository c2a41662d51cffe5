//! Cache Builder - Backend Factory
//!
//! Turns a [`CacheConfig`] (plus optional [`CacheOptions`]) into a ready
//! `Arc<dyn CacheBackend>`. This is the only place that dispatches on the
//! backend kind.
//!
//! | `backend` | `use_local_cache` | Result |
//! |---|---|---|
//! | `local` | ignored | [`LruCache`] |
//! | `moka` / `gocache` | ignored | [`MokaCache`](crate::MokaCache) |
//! | `redis` | `false` | [`RedisCache`](crate::RedisCache) |
//! | `redis` | `true` | [`LayeredCache`] (LRU L1 over Redis L2) |
//!
//! # Example
//!
//! ```rust,no_run
//! use tiered_cache::{CacheBuilder, CacheConfig, CacheOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = CacheBuilder::new(CacheConfig::from_env()?)
//!         .with_options(CacheOptions::from_env()?)
//!         .build()
//!         .await?;
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::backends::LruCache;
use crate::config::{BackendKind, CacheConfig, CacheOptions, LocalConfig, RedisConfig};
use crate::layered::LayeredCache;
use crate::traits::CacheBackend;

#[cfg(any(not(feature = "moka"), not(feature = "redis")))]
use crate::error::CacheError;

/// Builder for a configured cache backend
///
/// Construction is all-or-nothing: an unreachable Redis, an invalid setting
/// or a backend compiled out by cargo features fails `build()` and leaves
/// nothing running.
#[derive(Clone)]
pub struct CacheBuilder {
    config: CacheConfig,
    options: CacheOptions,
    remote: Option<Arc<dyn CacheBackend>>,
}

impl CacheBuilder {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            options: CacheOptions::default(),
            remote: None,
        }
    }

    /// Set the L1 options applied to remote backends
    #[must_use]
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an already-built backend in place of connecting to Redis
    ///
    /// Only consulted when the configured kind is remote. The backend is
    /// still fronted by an L1 when `use_local_cache` is set.
    #[must_use]
    pub fn with_remote(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    /// Build the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the backend kind is
    /// not compiled in, or the backend cannot be constructed.
    pub async fn build(self) -> Result<Arc<dyn CacheBackend>> {
        self.config.validate()?;

        info!(
            backend = %self.config.backend,
            use_local_cache = self.options.use_local_cache,
            "Building cache backend"
        );

        match self.config.backend {
            BackendKind::Local => Ok(Arc::new(LruCache::new(&self.config.local)?)),
            BackendKind::Moka => build_moka(&self.config.local),
            BackendKind::Redis => {
                let remote = match self.remote {
                    Some(remote) => remote,
                    None => connect_redis(&self.config.redis).await?,
                };
                if !self.options.use_local_cache {
                    return Ok(remote);
                }

                let l1 = LruCache::new(&LocalConfig {
                    default_expiration: self.options.local_expiration,
                    ..self.config.local.clone()
                })?;
                Ok(Arc::new(LayeredCache::new(Arc::new(l1), remote)))
            }
        }
    }
}

/// Build a backend from configuration
///
/// # Errors
///
/// Same as [`CacheBuilder::build`].
pub async fn new_cache(
    config: &CacheConfig,
    options: Option<&CacheOptions>,
) -> Result<Arc<dyn CacheBackend>> {
    let mut builder = CacheBuilder::new(config.clone());
    if let Some(options) = options {
        builder = builder.with_options(*options);
    }
    builder.build().await
}

#[cfg(feature = "moka")]
fn build_moka(local: &LocalConfig) -> Result<Arc<dyn CacheBackend>> {
    Ok(Arc::new(crate::backends::MokaCache::new(local)?))
}

#[cfg(not(feature = "moka"))]
fn build_moka(_local: &LocalConfig) -> Result<Arc<dyn CacheBackend>> {
    Err(CacheError::UnsupportedBackend("moka (feature disabled)".to_string()).into())
}

#[cfg(feature = "redis")]
async fn connect_redis(redis: &RedisConfig) -> Result<Arc<dyn CacheBackend>> {
    Ok(Arc::new(crate::backends::RedisCache::connect(redis).await?))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_redis: &RedisConfig) -> Result<Arc<dyn CacheBackend>> {
    Err(CacheError::UnsupportedBackend("redis (feature disabled)".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::time::Duration;

    fn local_only() -> CacheConfig {
        CacheConfig {
            local: LocalConfig {
                cleanup_interval: Duration::ZERO,
                ..LocalConfig::default()
            },
            ..CacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_local_builds_lru() {
        let cache = new_cache(&local_only(), None).await.unwrap();
        assert_eq!(cache.name(), "LRU");
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = local_only();
        config.local.max_size = 0;
        let err = new_cache(&config, None).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<CacheError>(),
            Some(CacheError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_override_with_and_without_l1() {
        let config = CacheConfig {
            backend: BackendKind::Redis,
            ..local_only()
        };
        let remote: Arc<dyn CacheBackend> = Arc::new(LruCache::with_capacity(10).unwrap());

        let direct = CacheBuilder::new(config.clone())
            .with_remote(Arc::clone(&remote))
            .build()
            .await
            .unwrap();
        assert_eq!(direct.name(), "LRU");

        let layered = CacheBuilder::new(config)
            .with_options(CacheOptions {
                use_local_cache: true,
                local_expiration: Duration::from_secs(5),
            })
            .with_remote(remote)
            .build()
            .await
            .unwrap();
        assert_eq!(layered.name(), "Layered");

        layered
            .set("k", crate::CacheValue::Int(1), Duration::from_secs(60))
            .await
            .unwrap();
        let (_, ttl) = layered.get_with_ttl("k").await.unwrap();
        assert!(ttl <= Duration::from_secs(5));
    }

    #[cfg(feature = "moka")]
    #[tokio::test]
    async fn test_moka_builds_moka() {
        let config = CacheConfig {
            backend: BackendKind::Moka,
            ..local_only()
        };
        let cache = new_cache(&config, None).await.unwrap();
        assert_eq!(cache.name(), "Moka");
        cache.close().await.unwrap();
    }
}
