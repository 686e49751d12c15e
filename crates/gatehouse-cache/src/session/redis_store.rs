//! Redis-backed session store
//!
//! Session state lives under `sid:<token>` with a sliding TTL. Login failure
//! counters live under `login:<key>`; each increment and its expiry run as
//! one Lua script, so gateway instances share them without races.

use std::time::Duration;

use async_trait::async_trait;
use gatehouse_core::{SessionStore, SessionToken, StoreError, StoreResult};

use super::StorePolicy;
use crate::pool::{RedisPoolError, SharedRedisPool};

/// Key prefix for session state
pub const SESSION_KEY_PREFIX: &str = "sid:";

/// Key prefix for login failure counters
pub const FAILURE_KEY_PREFIX: &str = "login:";

impl From<RedisPoolError> for StoreError {
    fn from(err: RedisPoolError) -> Self {
        StoreError::backend(err)
    }
}

/// Session store shared between gateway instances through Redis
#[derive(Debug, Clone)]
pub struct RedisStore {
    pool: SharedRedisPool,
    policy: StorePolicy,
}

impl RedisStore {
    #[must_use]
    pub fn new(pool: SharedRedisPool, policy: StorePolicy) -> Self {
        Self { pool, policy }
    }

    fn session_key(token: &SessionToken) -> String {
        format!("{SESSION_KEY_PREFIX}{token}")
    }

    fn failure_key(key: &str) -> String {
        format!("{FAILURE_KEY_PREFIX}{key}")
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn save_raw(&self, token: &SessionToken, state: String) -> StoreResult<()> {
        self.pool
            .set_ex(&Self::session_key(token), &state, self.policy.session_ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn get_raw(&self, token: &SessionToken) -> StoreResult<String> {
        self.pool
            .get_and_touch(&Self::session_key(token), self.policy.session_ttl.as_secs())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, token: &SessionToken) -> StoreResult<()> {
        self.pool.delete(&Self::session_key(token)).await?;
        Ok(())
    }

    async fn increment_failures(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let key = Self::failure_key(key);
        if delta == 0 {
            return Ok(self.pool.get_counter(&key).await?.unwrap_or(0));
        }

        let count = self
            .pool
            .incr_with_window(
                &key,
                delta,
                self.policy.max_failures,
                self.policy.lockout.as_secs(),
            )
            .await?;
        if delta > 0 && count == self.policy.max_failures {
            tracing::info!(key = %key, count = count, "Login lockout armed");
        }
        Ok(count)
    }

    async fn time_until_unlocked(&self, key: &str) -> StoreResult<Duration> {
        let ttl = self.pool.ttl(&Self::failure_key(key)).await?;
        Ok(ttl.map_or(Duration::ZERO, Duration::from_secs))
    }

    async fn clear_failures(&self, key: &str) -> StoreResult<()> {
        self.pool.delete(&Self::failure_key(key)).await?;
        Ok(())
    }
}
