//! Integration tests for backend construction from configuration

mod common;

use common::*;
use std::collections::HashMap;
use std::time::Duration;
use std::sync::Arc;
use tiered_cache::{
    BackendKind, CacheBackend, CacheBuilder, CacheConfig, CacheError, CacheOptions, CacheValue,
    LruCache, new_cache,
};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[tokio::test]
async fn test_local_from_environment() {
    init_tracing();
    let config = CacheConfig::from_lookup(env(&[
        ("CACHE_TYPE", "local"),
        ("CACHE_LOCAL_MAX_SIZE", "2"),
        ("CACHE_LOCAL_CLEANUP_INTERVAL", "0s"),
    ]))
    .unwrap();

    let cache = new_cache(&config, None).await.unwrap();
    assert_eq!(cache.name(), "LRU");

    for key in ["a", "b", "c"] {
        cache.set(key, CacheValue::from(key), Duration::ZERO).await.unwrap();
    }
    assert_eq!(cache.get("a").await, None);
    assert_eq!(cache.stats().evictions, 1);
    cache.close().await.unwrap();
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn test_moka_ignores_local_cache_option() {
    let config = CacheConfig {
        backend: BackendKind::Moka,
        ..CacheConfig::default()
    };
    let options = CacheOptions {
        use_local_cache: true,
        ..CacheOptions::default()
    };

    let cache = new_cache(&config, Some(&options)).await.unwrap();
    assert_eq!(cache.name(), "Moka");
    cache.close().await.unwrap();
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn test_gocache_type_builds_moka() {
    let config = CacheConfig::from_lookup(env(&[
        ("CACHE_TYPE", "gocache"),
        ("CACHE_LOCAL_CLEANUP_INTERVAL", "0s"),
    ]))
    .unwrap();

    let cache = new_cache(&config, None).await.unwrap();
    assert_eq!(cache.name(), "Moka");
    cache.set("k", CacheValue::Int(1), Duration::ZERO).await.unwrap();
    assert_eq!(cache.get("k").await, Some(CacheValue::Int(1)));
    cache.close().await.unwrap();
}

#[test]
fn test_unknown_backend_is_rejected() {
    let err = CacheConfig::from_lookup(env(&[("CACHE_TYPE", "memcached")])).unwrap_err();
    assert_eq!(err, CacheError::UnsupportedBackend("memcached".to_string()));
}

#[tokio::test]
async fn test_invalid_pool_size_is_rejected() {
    let config = CacheConfig::from_lookup(env(&[
        ("CACHE_TYPE", "redis"),
        ("REDIS_POOL_SIZE", "0"),
    ]))
    .unwrap();

    let err = new_cache(&config, None).await.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<CacheError>(),
        Some(CacheError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_unreachable_redis_fails_construction() {
    let mut config = CacheConfig {
        backend: BackendKind::Redis,
        ..CacheConfig::default()
    };
    config.redis.addr = "127.0.0.1:1".to_string();
    config.redis.dial_timeout = Duration::from_millis(300);

    let options = CacheOptions {
        use_local_cache: true,
        ..CacheOptions::default()
    };
    assert!(new_cache(&config, None).await.is_err());
    assert!(new_cache(&config, Some(&options)).await.is_err());
}

#[tokio::test]
async fn test_remote_with_local_cache_is_layered() {
    let config = CacheConfig {
        backend: BackendKind::Redis,
        ..CacheConfig::default()
    };
    let remote = Arc::new(LruCache::new(&local_config(100)).unwrap());

    let cache = CacheBuilder::new(config)
        .with_options(CacheOptions {
            use_local_cache: true,
            local_expiration: Duration::from_secs(30),
        })
        .with_remote(Arc::clone(&remote) as Arc<dyn CacheBackend>)
        .build()
        .await
        .unwrap();

    assert_eq!(cache.name(), "Layered");
    cache
        .set("k", CacheValue::Int(1), Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(remote.get("k").await, Some(CacheValue::Int(1)));
    cache.close().await.unwrap();
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_redis_with_local_cache() {
    init_tracing();
    if try_redis().await.is_none() {
        return;
    }

    let config = CacheConfig {
        backend: BackendKind::Redis,
        redis: redis_config(),
        ..CacheConfig::default()
    };
    let options = CacheOptions {
        use_local_cache: true,
        local_expiration: Duration::from_secs(30),
    };

    let cache = new_cache(&config, Some(&options)).await.unwrap();
    assert_eq!(cache.name(), "Layered");
    check_contract(cache.as_ref(), &test_key("factory_layered")).await;
    cache.close().await.unwrap();
}
