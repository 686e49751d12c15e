//! Lifetimes shared by both session store backends

use std::time::Duration;

use gatehouse_common::SessionConfig;

/// How long sessions live and when failure counters lock out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Sliding lifetime of session state
    pub session_ttl: Duration,
    /// Count at which the lockout is armed
    pub max_failures: i64,
    /// Lifetime of a failure counter, restarted when the lockout is armed
    pub lockout: Duration,
}

impl StorePolicy {
    /// Whether an increment of `delta` that produced `count` should (re)arm the lockout
    ///
    /// The window is set when a counter is created and restarted once it
    /// reaches the maximum.
    #[must_use]
    pub fn arms_lockout(&self, delta: i64, count: i64) -> bool {
        delta > 0 && (count == delta || count == self.max_failures)
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(3600),
            max_failures: 5,
            lockout: Duration::from_secs(600),
        }
    }
}

impl From<&SessionConfig> for StorePolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            session_ttl: Duration::from_secs(config.ttl_secs),
            max_failures: config.max_login_failures,
            lockout: Duration::from_secs(config.lockout_secs),
        }
    }
}
