//! In-process session store
//!
//! Backed by `DashMap`s with per-entry deadlines. Expired entries are treated
//! as absent on access and reclaimed by [`MemoryStore::purge_expired`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use gatehouse_core::{SessionStore, SessionToken, StoreError, StoreResult};

use super::StorePolicy;

#[derive(Debug)]
struct Entry {
    state: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Counter {
    count: i64,
    expires_at: Option<Instant>,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Session store held entirely in process memory
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    failures: DashMap<String, Counter>,
    policy: StorePolicy,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new(policy: StorePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            failures: DashMap::new(),
            policy,
        }
    }

    /// Drop expired sessions and counters, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len() + self.failures.len();

        self.entries.retain(|_, entry| entry.expires_at > now);
        self.failures.retain(|_, counter| !counter.is_expired(now));

        let removed = before.saturating_sub(self.entries.len() + self.failures.len());
        if removed > 0 {
            tracing::debug!(removed = removed, "Purged expired session store entries");
        }
        removed
    }

    /// Number of live session entries (including not-yet-purged expired ones)
    pub fn session_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StorePolicy::default())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_raw(&self, token: &SessionToken, state: String) -> StoreResult<()> {
        self.entries.insert(
            token.as_str().to_string(),
            Entry {
                state,
                expires_at: Instant::now() + self.policy.session_ttl,
            },
        );
        Ok(())
    }

    async fn get_raw(&self, token: &SessionToken) -> StoreResult<String> {
        let now = Instant::now();
        let found = match self.entries.get_mut(token.as_str()) {
            Some(mut entry) if entry.expires_at > now => {
                entry.expires_at = now + self.policy.session_ttl;
                Some(entry.state.clone())
            }
            Some(_) => None,
            None => return Err(StoreError::NotFound),
        };

        found.ok_or_else(|| {
            self.entries
                .remove_if(token.as_str(), |_, entry| entry.expires_at <= now);
            StoreError::NotFound
        })
    }

    async fn delete(&self, token: &SessionToken) -> StoreResult<()> {
        self.entries.remove(token.as_str());
        Ok(())
    }

    async fn increment_failures(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let now = Instant::now();

        if delta == 0 {
            return Ok(self
                .failures
                .get(key)
                .filter(|counter| !counter.is_expired(now))
                .map_or(0, |counter| counter.count));
        }

        let mut counter = self.failures.entry(key.to_string()).or_default();
        if counter.is_expired(now) {
            *counter = Counter::default();
        }
        counter.count += delta;
        if self.policy.arms_lockout(delta, counter.count) {
            counter.expires_at = Some(now + self.policy.lockout);
        }
        Ok(counter.count)
    }

    async fn time_until_unlocked(&self, key: &str) -> StoreResult<Duration> {
        let now = Instant::now();
        Ok(self
            .failures
            .get(key)
            .and_then(|counter| counter.expires_at)
            .map_or(Duration::ZERO, |at| at.saturating_duration_since(now)))
    }

    async fn clear_failures(&self, key: &str) -> StoreResult<()> {
        self.failures.remove(key);
        Ok(())
    }
}
