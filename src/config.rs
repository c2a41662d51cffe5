//! Cache Configuration
//!
//! [`CacheConfig`] selects and tunes a backend; [`CacheOptions`] controls the
//! optional in-process L1 placed in front of a remote backend. Both
//! deserialize with serde (durations in humantime form, e.g. `"5m"`) and can
//! be loaded from the environment.
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `CACHE_TYPE` | `backend` (`local`, `moka` or `gocache`, `redis`) |
//! | `CACHE_LOCAL_MAX_SIZE` | `local.max_size` |
//! | `CACHE_LOCAL_DEFAULT_EXPIRATION` | `local.default_expiration` |
//! | `CACHE_LOCAL_CLEANUP_INTERVAL` | `local.cleanup_interval` |
//! | `REDIS_ADDR` | `redis.addr` |
//! | `REDIS_PASSWORD` | `redis.password` |
//! | `REDIS_DB` | `redis.db` |
//! | `REDIS_POOL_SIZE` | `redis.pool_size` |
//! | `REDIS_MIN_IDLE_CONNS` | `redis.min_idle_conns` |
//! | `REDIS_DIAL_TIMEOUT` | `redis.dial_timeout` |
//! | `REDIS_READ_TIMEOUT` | `redis.read_timeout` |
//! | `REDIS_WRITE_TIMEOUT` | `redis.write_timeout` |
//! | `REDIS_IDLE_TIMEOUT` | `redis.idle_timeout` |
//! | `CACHE_USE_LOCAL` | `CacheOptions::use_local_cache` |
//! | `CACHE_LOCAL_EXPIRATION` | `CacheOptions::local_expiration` |
//!
//! Unset variables keep their defaults; malformed ones are an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use humantime_serde::re::humantime;

use crate::error::CacheError;

/// Which backend the factory builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process LRU store ([`LruCache`](crate::LruCache))
    #[default]
    Local,
    /// In-process expiring store ([`MokaCache`](crate::MokaCache)); also
    /// accepted as `gocache`
    #[serde(alias = "gocache")]
    Moka,
    /// Remote Redis store ([`RedisCache`](crate::RedisCache))
    Redis,
}

impl BackendKind {
    /// Remote kinds may be fronted by an in-process L1
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::Redis)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Moka => "moka",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "lru" => Ok(Self::Local),
            "moka" | "gocache" => Ok(Self::Moka),
            "redis" => Ok(Self::Redis),
            other => Err(CacheError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Top-level cache configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    pub local: LocalConfig,
    pub redis: RedisConfig,
}

/// Settings for the in-process stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Capacity of the LRU store. Ignored by the Moka store.
    pub max_size: usize,
    /// TTL used for counters created by `increment` and for L1 backfills
    #[serde(with = "humantime_serde")]
    pub default_expiration: Duration,
    /// Period of the background expiry sweep; zero disables it
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            default_expiration: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Settings for the Redis store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `host:port`, or a full `redis://` / `rediss://` URL
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    /// Number of multiplexed connections used round-robin
    pub pool_size: usize,
    /// Accepted for compatibility; multiplexed connections are always open
    pub min_idle_conns: usize,
    /// Bound on connect + `PING` at construction (zero = unbounded)
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,
    /// Bound on read commands (zero = unbounded)
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Bound on mutating commands (zero = unbounded)
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// Accepted for compatibility; multiplexed connections do not idle out
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            pool_size: 1,
            min_idle_conns: 0,
            dial_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("min_idle_conns", &self.min_idle_conns)
            .field("dial_timeout", &self.dial_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl RedisConfig {
    /// Connection URL: `redis://[:password@]addr/db`
    #[must_use]
    pub fn connection_url(&self) -> String {
        if has_redis_scheme(&self.addr) {
            return self.addr.clone();
        }
        match self.password.as_deref() {
            Some(password) if !password.is_empty() => {
                format!("redis://:{password}@{}/{}", self.addr, self.db)
            }
            _ => format!("redis://{}/{}", self.addr, self.db),
        }
    }

    /// Connection URL with any password replaced by `***`
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        let Some((scheme, rest)) = url.split_once("://") else {
            return url;
        };
        match rest.rsplit_once('@') {
            Some((credentials, host)) => match credentials.split_once(':') {
                Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
                None => format!("{scheme}://***@{host}"),
            },
            None => url,
        }
    }
}

fn has_redis_scheme(addr: &str) -> bool {
    addr.starts_with("redis://") || addr.starts_with("rediss://")
}

impl CacheConfig {
    /// Load from process environment variables (see module docs)
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] or [`CacheError::UnsupportedBackend`]
    /// when a variable is set but malformed.
    pub fn from_env() -> Result<Self, CacheError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CacheError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let mut config = Self::default();

        if let Some(kind) = vars.get("CACHE_TYPE") {
            config.backend = kind.parse()?;
        }

        let local = &mut config.local;
        vars.parse_into("CACHE_LOCAL_MAX_SIZE", &mut local.max_size)?;
        vars.duration_into("CACHE_LOCAL_DEFAULT_EXPIRATION", &mut local.default_expiration)?;
        vars.duration_into("CACHE_LOCAL_CLEANUP_INTERVAL", &mut local.cleanup_interval)?;

        let redis = &mut config.redis;
        if let Some(addr) = vars.get("REDIS_ADDR") {
            redis.addr = addr;
        }
        if let Some(password) = vars.get("REDIS_PASSWORD") {
            redis.password = Some(password);
        }
        vars.parse_into("REDIS_DB", &mut redis.db)?;
        vars.parse_into("REDIS_POOL_SIZE", &mut redis.pool_size)?;
        vars.parse_into("REDIS_MIN_IDLE_CONNS", &mut redis.min_idle_conns)?;
        vars.duration_into("REDIS_DIAL_TIMEOUT", &mut redis.dial_timeout)?;
        vars.duration_into("REDIS_READ_TIMEOUT", &mut redis.read_timeout)?;
        vars.duration_into("REDIS_WRITE_TIMEOUT", &mut redis.write_timeout)?;
        vars.duration_into("REDIS_IDLE_TIMEOUT", &mut redis.idle_timeout)?;

        Ok(config)
    }

    /// Reject settings no backend can run with
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.local.max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "local.max_size must be greater than zero".to_string(),
            ));
        }
        if self.backend == BackendKind::Redis {
            if self.redis.addr.trim().is_empty() {
                return Err(CacheError::InvalidConfig(
                    "redis.addr must not be empty".to_string(),
                ));
            }
            if self.redis.pool_size == 0 {
                return Err(CacheError::InvalidConfig(
                    "redis.pool_size must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Options for fronting a remote backend with an in-process L1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    pub use_local_cache: bool,
    /// Default TTL of the L1 store (backfills, counter mirrors)
    #[serde(with = "humantime_serde")]
    pub local_expiration: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            use_local_cache: false,
            local_expiration: Duration::from_secs(60),
        }
    }
}

impl CacheOptions {
    /// Load from `CACHE_USE_LOCAL` and `CACHE_LOCAL_EXPIRATION`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] when a variable is malformed.
    pub fn from_env() -> Result<Self, CacheError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CacheError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let mut options = Self::default();
        vars.parse_into("CACHE_USE_LOCAL", &mut options.use_local_cache)?;
        vars.duration_into("CACHE_LOCAL_EXPIRATION", &mut options.local_expiration)?;
        Ok(options)
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse_into<T>(&self, name: &str, slot: &mut T) -> Result<(), CacheError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if let Some(raw) = self.get(name) {
            *slot = raw
                .trim()
                .parse()
                .map_err(|e| CacheError::InvalidConfig(format!("{name}={raw}: {e}")))?;
        }
        Ok(())
    }

    fn duration_into(&self, name: &str, slot: &mut Duration) -> Result<(), CacheError> {
        if let Some(raw) = self.get(name) {
            *slot = humantime::parse_duration(raw.trim())
                .map_err(|e| CacheError::InvalidConfig(format!("{name}={raw}: {e}")))?;
        }
        Ok(())
    }
}
