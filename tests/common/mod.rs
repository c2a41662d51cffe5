//! Common utilities for integration tests
//!
//! - Tracing setup
//! - Unique test keys
//! - Redis connection helpers (tests skip when no server answers)
//! - The behavioural checks every backend must pass

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use tiered_cache::{CacheBackend, CacheBackendExt, CacheValue, LocalConfig, RedisConfig};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Create a test key with unique suffix
pub fn test_key(name: &str) -> String {
    format!("test_{}_{}", name, rand::random::<u32>())
}

/// Local settings with the sweep disabled unless a test asks for it
pub fn local_config(max_size: usize) -> LocalConfig {
    LocalConfig {
        max_size,
        default_expiration: Duration::from_secs(300),
        cleanup_interval: Duration::ZERO,
    }
}

/// Redis settings from `REDIS_URL` / `REDIS_ADDR` with a short dial timeout
pub fn redis_config() -> RedisConfig {
    let addr = std::env::var("REDIS_URL")
        .or_else(|_| std::env::var("REDIS_ADDR"))
        .unwrap_or_else(|_| "127.0.0.1:6379".to_string());
    RedisConfig {
        addr,
        dial_timeout: Duration::from_millis(500),
        ..RedisConfig::default()
    }
}

/// Connect to Redis, or `None` (with a note on stderr) when unreachable
#[cfg(feature = "redis")]
pub async fn try_redis() -> Option<tiered_cache::RedisCache> {
    match tiered_cache::RedisCache::connect(&redis_config()).await {
        Ok(cache) => Some(cache),
        Err(e) => {
            eprintln!("Skipping Redis test: {e:#}");
            None
        }
    }
}

pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct User {
        pub id: u64,
        pub name: String,
        pub email: String,
    }

    impl User {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                name: format!("User {id}"),
                email: format!("user{id}@example.com"),
            }
        }
    }

    pub fn json_user(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("User {id}"),
            "tags": ["a", "b"],
        })
    }
}

/// Behaviour shared by every backend; keys are namespaced by `prefix`
pub async fn check_contract(cache: &dyn CacheBackend, prefix: &str) {
    let key = |name: &str| format!("{prefix}:{name}");

    // set / get within TTL
    let k = key("plain");
    cache
        .set(&k, CacheValue::from("value"), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(cache.get(&k).await, Some(CacheValue::from("value")));
    assert!(cache.exists(&k).await);

    // scalar and document variants keep their shape
    let doc = key("doc");
    let user = CacheValue::from(test_data::json_user(7));
    cache.set(&doc, user.clone(), Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(&doc).await, Some(user));

    let int = key("int");
    cache.set(&int, CacheValue::Int(42), Duration::ZERO).await.unwrap();
    assert_eq!(cache.get(&int).await, Some(CacheValue::Int(42)));

    // remaining TTL
    let (_, ttl) = cache.get_with_ttl(&k).await.unwrap();
    assert!(ttl > Duration::ZERO && ttl <= Duration::from_secs(60), "ttl = {ttl:?}");
    // A layered cache gives untimed writes L1's default TTL.
    if cache.name() != "Layered" {
        let (_, ttl) = cache.get_with_ttl(&int).await.unwrap();
        assert_eq!(ttl, Duration::ZERO);
    }

    // expiry
    let short = key("short");
    cache
        .set(&short, CacheValue::Int(1), Duration::from_millis(100))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(cache.get(&short).await, None);
    assert!(!cache.exists(&short).await);
    assert!(cache.get_with_ttl(&short).await.is_none());

    // counters
    let counter = key("counter");
    assert_eq!(cache.increment(&counter, 5).await.unwrap(), 5);
    assert_eq!(cache.decrement(&counter, 5).await.unwrap(), 0);
    let negative = key("negative");
    assert_eq!(cache.decrement(&negative, 3).await.unwrap(), -3);

    // batches: absent keys are excluded
    let (k1, k2, k3) = (key("k1"), key("k2"), key("k3"));
    let items = HashMap::from([
        (k1.clone(), CacheValue::from("v1")),
        (k2.clone(), CacheValue::from("v2")),
    ]);
    cache.set_multi(items, Duration::from_secs(60)).await.unwrap();
    let found = cache.get_multi(&[&k1, &k2, &k3]).await;
    assert_eq!(found.len(), 2);
    assert_eq!(found.get(&k1), Some(&CacheValue::from("v1")));
    assert!(!found.contains_key(&k3));

    cache.delete_multi(&[&k1, &k2, &k3]).await.unwrap();
    assert!(cache.get_multi(&[&k1, &k2]).await.is_empty());

    // delete is idempotent
    cache.delete(&k).await.unwrap();
    cache.delete(&k).await.unwrap();
    assert_eq!(cache.get(&k).await, None);

    // typed helpers
    let typed = key("typed");
    let alice = test_data::User::new(1);
    cache
        .set_typed(&typed, &alice, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(cache.get_typed::<test_data::User>(&typed).await, Some(alice));
    assert_eq!(cache.get_typed::<Vec<u8>>(&typed).await, None);

    assert!(cache.health_check().await);

    cache.delete_multi(&[&doc, &int, &counter, &negative, &typed]).await.unwrap();
}
