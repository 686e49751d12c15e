//! Login brute-force throttling
//!
//! Flow per login attempt:
//!
//! 1. [`LoginThrottle::check`] before any password comparison; a client at
//!    the maximum is rejected without touching credentials.
//! 2. [`LoginThrottle::record`] with the outcome. The failure that reaches
//!    the maximum is itself rejected as rate limited.
//! 3. [`LoginThrottle::clear`] after a successful login.

use std::sync::Arc;

use gatehouse_core::SessionStore;

use super::SessionError;

/// Counts failed logins per client key through a [`SessionStore`]
#[derive(Clone)]
pub struct LoginThrottle {
    store: Arc<dyn SessionStore>,
    max_failures: i64,
}

impl LoginThrottle {
    pub fn new(store: Arc<dyn SessionStore>, max_failures: i64) -> Self {
        Self { store, max_failures }
    }

    pub fn max_failures(&self) -> i64 {
        self.max_failures
    }

    /// Reject the attempt if `key` is locked out
    pub async fn check(&self, key: &str) -> Result<(), SessionError> {
        let count = self.store.increment_failures(key, 0).await?;
        if count >= self.max_failures {
            return Err(self.locked(key).await?);
        }
        Ok(())
    }

    /// Record the outcome of a credential comparison
    ///
    /// Success leaves the counter alone. A failure increments it and returns
    /// `SessionError::RateLimited` once the count reaches the maximum.
    pub async fn record(&self, key: &str, success: bool) -> Result<(), SessionError> {
        if success {
            return Ok(());
        }

        let count = self.store.increment_failures(key, 1).await?;
        tracing::debug!(client = %key, failures = count, "Failed login recorded");

        if count >= self.max_failures {
            tracing::warn!(client = %key, failures = count, "Login lockout armed");
            return Err(self.locked(key).await?);
        }
        Ok(())
    }

    /// Forget all failures for `key`
    pub async fn clear(&self, key: &str) -> Result<(), SessionError> {
        self.store.clear_failures(key).await?;
        Ok(())
    }

    async fn locked(&self, key: &str) -> Result<SessionError, SessionError> {
        let retry_after = self.store.time_until_unlocked(key).await?;
        Ok(SessionError::RateLimited { retry_after })
    }
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle")
            .field("max_failures", &self.max_failures)
            .finish()
    }
}
