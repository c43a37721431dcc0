//! Redis-backed cache using a `bb8` connection pool.

use std::time::Duration;

use bb8_redis::{RedisConnectionManager, bb8, redis};
use tracing::info;

use super::{CacheError, KeyValueCache};

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(e: bb8::RunError<redis::RedisError>) -> Self {
        Self::Pool(e.to_string())
    }
}

#[derive(Clone)]
pub struct RedisCache {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisCache {
    /// Build a pool for `url` and verify the server answers `PING`.
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = bb8::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .await?;

        {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        }

        info!(pool_size, "Connected to Redis");
        Ok(Self { pool })
    }
}

impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }
        let _: () = cmd.query_async(&mut *conn).await?;
        Ok(())
    }
}
