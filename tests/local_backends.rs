//! Integration tests for the in-process backends
//!
//! Both stores run the shared behavioural checks through `dyn CacheBackend`,
//! then their store-specific behaviour is covered directly.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tiered_cache::{CacheBackend, CacheValue, LocalConfig, LruCache};

#[tokio::test]
async fn test_lru_contract() {
    init_tracing();
    let cache = LruCache::new(&local_config(100)).unwrap();
    check_contract(&cache, &test_key("lru")).await;
    cache.close().await.unwrap();
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn test_moka_contract() {
    init_tracing();
    let cache = tiered_cache::MokaCache::new(&local_config(100)).unwrap();
    check_contract(&cache, &test_key("moka")).await;
    cache.close().await.unwrap();
}

/// With `max_size = 2`: set a, set b, get a, set c evicts b
#[tokio::test]
async fn test_lru_eviction_order() {
    let cache = LruCache::new(&local_config(2)).unwrap();

    cache.set("a", CacheValue::Int(1), Duration::ZERO).await.unwrap();
    cache.set("b", CacheValue::Int(2), Duration::ZERO).await.unwrap();
    assert!(cache.get("a").await.is_some());
    cache.set("c", CacheValue::Int(3), Duration::ZERO).await.unwrap();

    assert_eq!(cache.get("a").await, Some(CacheValue::Int(1)));
    assert_eq!(cache.get("b").await, None);
    assert_eq!(cache.get("c").await, Some(CacheValue::Int(3)));
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_lru_sweep_reclaims_and_stops_on_close() {
    init_tracing();
    let cache = LruCache::new(&LocalConfig {
        max_size: 100,
        default_expiration: Duration::from_secs(60),
        cleanup_interval: Duration::from_millis(25),
    })
    .unwrap();

    for i in 0..10 {
        cache
            .set(&format!("k{i}"), CacheValue::Int(i), Duration::from_millis(20))
            .await
            .unwrap();
    }
    assert_eq!(cache.len(), 10);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.len(), 0, "sweep should drop entries nobody reads");

    cache.close().await.unwrap();

    // No sweep after close: expired entries stay until touched.
    cache
        .set("late", CacheValue::Int(1), Duration::from_millis(10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("late").await, None);
    assert_eq!(cache.len(), 0);
}

#[tokio::test]
async fn test_lru_clear() {
    let cache = LruCache::new(&local_config(10)).unwrap();
    for i in 0..5 {
        cache.set(&format!("k{i}"), CacheValue::Int(i), Duration::ZERO).await.unwrap();
    }
    cache.clear().await.unwrap();

    assert!(cache.is_empty());
    for i in 0..5 {
        assert!(!cache.exists(&format!("k{i}")).await);
    }
}

#[tokio::test]
async fn test_lru_concurrent_increments() {
    let cache: Arc<dyn CacheBackend> = Arc::new(LruCache::new(&local_config(10)).unwrap());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                cache.increment("counter", 1).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.get("counter").await, Some(CacheValue::Int(800)));
}

#[tokio::test]
async fn test_lru_replaces_non_numeric_on_increment() {
    let cache = LruCache::new(&local_config(10)).unwrap();
    cache.set("k", CacheValue::from("text"), Duration::ZERO).await.unwrap();
    assert_eq!(cache.increment("k", 7).await.unwrap(), 7);

    cache.set("f", CacheValue::Float(-1.5), Duration::ZERO).await.unwrap();
    assert_eq!(cache.increment("f", 3).await.unwrap(), 2);
}

#[tokio::test]
async fn test_lru_stats() {
    let cache = LruCache::new(&local_config(1)).unwrap();
    cache.set("a", CacheValue::Int(1), Duration::ZERO).await.unwrap();
    cache.set("b", CacheValue::Int(2), Duration::ZERO).await.unwrap();
    let _ = cache.get("a").await;
    let _ = cache.get("b").await;

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.size, Some(1));
    assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn test_moka_replaces_non_numeric_value_on_increment() {
    let cache = tiered_cache::MokaCache::new(&local_config(10)).unwrap();
    cache.set("k", CacheValue::from("text"), Duration::ZERO).await.unwrap();

    assert_eq!(cache.increment("k", 4).await.unwrap(), 4);
    assert_eq!(cache.get("k").await, Some(CacheValue::Int(4)));
    cache.close().await.unwrap();
}

#[cfg(feature = "moka")]
#[tokio::test]
async fn test_moka_clear() {
    let cache = tiered_cache::MokaCache::new(&local_config(10)).unwrap();
    for i in 0..5 {
        cache.set(&format!("k{i}"), CacheValue::Int(i), Duration::ZERO).await.unwrap();
    }
    cache.clear().await.unwrap();

    for i in 0..5 {
        assert_eq!(cache.get(&format!("k{i}")).await, None);
    }
    cache.close().await.unwrap();
}
