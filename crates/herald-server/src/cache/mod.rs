//! Key-value cache backends.
//!
//! The cache holds derived, read-optimised data (the per-application channel
//! configuration) and short-lived OAuth state tokens. It is never the source
//! of truth and is not coordinated with relational transactions.

mod application;
mod memory;
mod redis;
mod state;

use std::future::Future;
use std::time::Duration;

pub use application::{ApplicationCache, android_params_key};
pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use state::{STATE_TTL, StateStore};

/// Errors raised by a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend rejected or failed a command.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// No connection could be checked out of the pool.
    #[error("Cache pool error: {0}")]
    Pool(String),

    /// A cached value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Minimal string key-value contract.
///
/// `get` returns `Ok(None)` on a miss; a miss is never an error.
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;

    /// Store `value` under `key`. `ttl = None` means the entry never expires.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Runtime-selected cache backend.
#[derive(Clone)]
pub enum CacheBackend {
    Redis(RedisCache),
    Memory(MemoryCache),
}

impl CacheBackend {
    /// Connect to Redis when a URL is configured, otherwise fall back to the
    /// in-process cache.
    pub async fn from_config(config: &herald_core::config::CacheConfig) -> Result<Self, CacheError> {
        match &config.redis_url {
            Some(url) => Ok(Self::Redis(RedisCache::connect(url, config.pool_size).await?)),
            None => {
                tracing::warn!("No redis_url configured, using in-process memory cache");
                Ok(Self::Memory(MemoryCache::new()))
            }
        }
    }
}

impl KeyValueCache for CacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self {
            Self::Redis(c) => c.get(key).await,
            Self::Memory(c) => c.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        match self {
            Self::Redis(c) => c.set(key, value, ttl).await,
            Self::Memory(c) => c.set(key, value, ttl).await,
        }
    }
}
