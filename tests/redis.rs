//! Integration tests against a real Redis server
//!
//! Set `REDIS_URL` (or `REDIS_ADDR`) to point at a server; every test returns
//! early when none answers. `clear()` is not exercised here because
//! `FLUSHDB` would race with the other tests sharing the database.

#![cfg(feature = "redis")]

mod common;

use common::*;
use std::collections::HashMap;
use std::time::Duration;
use tiered_cache::{CacheBackend, CacheError, CacheValue, RedisCache};

#[tokio::test]
async fn test_redis_contract() {
    init_tracing();
    let Some(cache) = try_redis().await else {
        return;
    };
    check_contract(&cache, &test_key("redis")).await;
}

#[tokio::test]
async fn test_redis_pool_round_robin() {
    let mut config = redis_config();
    config.pool_size = 3;
    let Ok(cache) = RedisCache::connect(&config).await else {
        eprintln!("Skipping Redis test: server unavailable");
        return;
    };

    let prefix = test_key("pool");
    for i in 0..9 {
        cache
            .set(&format!("{prefix}:{i}"), CacheValue::Int(i), Duration::from_secs(30))
            .await
            .unwrap();
    }
    for i in 0..9 {
        assert_eq!(
            cache.get(&format!("{prefix}:{i}")).await,
            Some(CacheValue::Int(i))
        );
    }
    assert_eq!(cache.stats().hits, 9);
}

#[tokio::test]
async fn test_redis_foreign_payload_reads_as_string() {
    let Some(cache) = try_redis().await else {
        return;
    };
    let key = test_key("foreign");

    let client = redis::Client::open(redis_config().connection_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let () = redis::cmd("SET")
        .arg(&key)
        .arg("plain text, not json")
        .query_async(&mut conn)
        .await
        .unwrap();

    assert_eq!(
        cache.get(&key).await,
        Some(CacheValue::from("plain text, not json"))
    );
    let found = cache.get_multi(&[key.as_str()]).await;
    assert_eq!(found.get(&key), Some(&CacheValue::from("plain text, not json")));
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_redis_get_multi_skips_wrong_type_key() {
    let Some(cache) = try_redis().await else {
        return;
    };
    let prefix = test_key("wrongtype");
    let (a, list, c) = (format!("{prefix}:a"), format!("{prefix}:list"), format!("{prefix}:c"));

    cache.set(&a, CacheValue::Int(1), Duration::from_secs(30)).await.unwrap();
    cache.set(&c, CacheValue::from("three"), Duration::from_secs(30)).await.unwrap();
    let client = redis::Client::open(redis_config().connection_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let _: i64 = redis::cmd("LPUSH")
        .arg(&list)
        .arg("x")
        .query_async(&mut conn)
        .await
        .unwrap();

    let found = cache.get_multi(&[a.as_str(), list.as_str(), c.as_str()]).await;
    assert_eq!(found.len(), 2);
    assert_eq!(found.get(&a), Some(&CacheValue::Int(1)));
    assert_eq!(found.get(&c), Some(&CacheValue::from("three")));
    assert!(!found.contains_key(&list));

    cache.delete_multi(&[a.as_str(), list.as_str(), c.as_str()]).await.unwrap();
}

#[tokio::test]
async fn test_redis_bytes_round_trip() {
    let Some(cache) = try_redis().await else {
        return;
    };
    let key = test_key("bytes");
    let payload = CacheValue::from(vec![0u8, 159, 146, 150]);

    cache.set(&key, payload.clone(), Duration::from_secs(30)).await.unwrap();
    assert_eq!(cache.get(&key).await, Some(payload));
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_redis_increment_on_text_fails() {
    let Some(cache) = try_redis().await else {
        return;
    };
    let key = test_key("text_counter");
    cache
        .set(&key, CacheValue::from("abc"), Duration::from_secs(30))
        .await
        .unwrap();

    assert!(cache.increment(&key, 1).await.is_err());
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_redis_closed_backend() {
    let Some(cache) = try_redis().await else {
        return;
    };
    let key = test_key("closed");
    cache.set(&key, CacheValue::Int(1), Duration::from_secs(30)).await.unwrap();

    cache.close().await.unwrap();
    cache.close().await.unwrap();

    assert_eq!(cache.get(&key).await, None);
    assert!(!cache.exists(&key).await);
    assert!(cache.get_multi(&[key.as_str()]).await.is_empty());
    assert!(!cache.health_check().await);

    let err = cache
        .set(&key, CacheValue::Int(2), Duration::ZERO)
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<CacheError>(),
        Some(&CacheError::Closed("Redis"))
    );
    assert!(cache.set_multi(HashMap::from([(key.clone(), CacheValue::Int(3))]), Duration::ZERO).await.is_err());
    assert!(cache.increment(&key, 1).await.is_err());
}
