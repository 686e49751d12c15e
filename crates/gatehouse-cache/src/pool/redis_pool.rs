//! Redis connection pool using deadpool-redis.
//!
//! Wraps the pool with the handful of key operations the session store
//! needs. Stream commands borrow a connection through [`RedisPool::get`].

use std::sync::{Arc, LazyLock};

use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};

/// Pool sizing and target
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 16,
        }
    }
}

impl From<&gatehouse_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &gatehouse_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("TTL out of range: {0}s")]
    InvalidTtl(u64),
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

// KEYS[1] counter, ARGV[1] delta, ARGV[2] re-arm count, ARGV[3] window secs
static INCR_WITH_WINDOW: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local delta = tonumber(ARGV[1])
local count = redis.call('INCRBY', KEYS[1], delta)
if delta > 0 and (count == delta or count == tonumber(ARGV[2]) or redis.call('TTL', KEYS[1]) < 0) then
    redis.call('EXPIRE', KEYS[1], ARGV[3])
end
return count
",
    )
});

/// Redis takes expiry as a signed integer
fn ttl_arg(ttl: u64) -> RedisResult<i64> {
    i64::try_from(ttl).map_err(|_| RedisPoolError::InvalidTtl(ttl))
}

/// Strip credentials so the URL can be logged
fn redacted(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, host)| host)
}

impl RedisPool {
    /// Build the pool; no connection is made until first use
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        tracing::info!(
            url = %redacted(&config.url),
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    /// Borrow a connection
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// `PING` the server
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// `SET key value EX ttl`
    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RedisResult<()> {
        let mut conn = self.get().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    /// Read a string and push its expiry out to `ttl_secs`
    ///
    /// `GET` and `EXPIRE` go out as one pipeline; `EXPIRE` on a missing key
    /// does nothing.
    pub async fn get_and_touch(&self, key: &str, ttl_secs: u64) -> RedisResult<Option<String>> {
        let ttl = ttl_arg(ttl_secs)?;
        let mut conn = self.get().await?;
        let (value, _): (Option<String>, bool) = redis::pipe()
            .get(key)
            .expire(key, ttl)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    /// Read an integer counter without changing it
    pub async fn get_counter(&self, key: &str) -> RedisResult<Option<i64>> {
        let mut conn = self.get().await?;
        Ok(conn.get(key).await?)
    }

    /// `INCRBY` and the counter's expiry as one server-side step
    ///
    /// A positive `delta` sets the expiry to `window_secs` when it creates
    /// the key or brings it to exactly `rearm_at`. A counter found without
    /// an expiry gets one as well, so no counter outlives its window.
    pub async fn incr_with_window(
        &self,
        key: &str,
        delta: i64,
        rearm_at: i64,
        window_secs: u64,
    ) -> RedisResult<i64> {
        let window = ttl_arg(window_secs)?;
        let mut conn = self.get().await?;
        let count: i64 = INCR_WITH_WINDOW
            .key(key)
            .arg(delta)
            .arg(rearm_at)
            .arg(window)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Seconds left on `key`; `None` when the key is missing or has no expiry
    pub async fn ttl(&self, key: &str) -> RedisResult<Option<u64>> {
        let mut conn = self.get().await?;
        let ttl: i64 = conn.ttl(key).await?;
        Ok(u64::try_from(ttl).ok())
    }

    pub async fn delete(&self, key: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }
}

/// Pool shared between the session store and the queue consumer
pub type SharedRedisPool = Arc<RedisPool>;

pub fn create_shared_pool(config: RedisPoolConfig) -> RedisResult<SharedRedisPool> {
    RedisPool::new(config).map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_redis_config() {
        let redis_config = gatehouse_common::RedisConfig {
            url: "redis://localhost:6380".to_string(),
            max_connections: 32,
        };
        let pool_config = RedisPoolConfig::from(&redis_config);
        assert_eq!(pool_config.url, "redis://localhost:6380");
        assert_eq!(pool_config.max_connections, 32);
    }

    #[test]
    fn test_redacted_hides_credentials() {
        assert_eq!(redacted("redis://user:pw@cache:6379/0"), "cache:6379/0");
        assert_eq!(redacted("redis://cache:6379"), "redis://cache:6379");
    }

    #[test]
    fn test_ttl_arg_bounds() {
        assert_eq!(ttl_arg(600).unwrap(), 600);
        assert!(matches!(ttl_arg(u64::MAX), Err(RedisPoolError::InvalidTtl(_))));
    }

    #[tokio::test]
    async fn test_pool_is_lazy() {
        // Nothing listens on port 1, but building the pool must still succeed.
        let pool = RedisPool::new(RedisPoolConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 2,
        })
        .unwrap();
        assert!(pool.health_check().await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at 127.0.0.1:6379"]
    async fn test_counter_and_touch_against_redis() {
        let pool = RedisPool::new(RedisPoolConfig::default()).unwrap();
        let key = "gatehouse:test:counter";
        pool.delete(key).await.unwrap();

        assert_eq!(pool.get_counter(key).await.unwrap(), None);
        assert_eq!(pool.incr_with_window(key, 2, 5, 30).await.unwrap(), 2);
        assert_eq!(pool.get_counter(key).await.unwrap(), Some(2));
        assert!(pool.ttl(key).await.unwrap().unwrap() <= 30);

        // A zero delta reads without touching the expiry
        assert_eq!(pool.incr_with_window(key, 0, 5, 300).await.unwrap(), 2);
        assert!(pool.ttl(key).await.unwrap().unwrap() <= 30);

        // Reaching the re-arm count restarts the window
        assert_eq!(pool.incr_with_window(key, 3, 5, 300).await.unwrap(), 5);
        assert!(pool.ttl(key).await.unwrap().unwrap() > 30);

        pool.set_ex("gatehouse:test:value", "{}", 5).await.unwrap();
        assert_eq!(
            pool.get_and_touch("gatehouse:test:value", 60).await.unwrap().as_deref(),
            Some("{}")
        );
        assert!(pool.ttl("gatehouse:test:value").await.unwrap().unwrap() > 5);
        pool.delete(key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at 127.0.0.1:6379"]
    async fn test_counter_without_expiry_gets_one_on_next_increment() {
        let pool = RedisPool::new(RedisPoolConfig::default()).unwrap();
        let key = "gatehouse:test:stranded";
        let mut conn = pool.get().await.unwrap();
        conn.set::<_, _, ()>(key, 7).await.unwrap();
        assert_eq!(pool.ttl(key).await.unwrap(), None);

        assert_eq!(pool.incr_with_window(key, 1, 5, 60).await.unwrap(), 8);
        assert!(pool.ttl(key).await.unwrap().is_some());
        pool.delete(key).await.unwrap();
    }
}
