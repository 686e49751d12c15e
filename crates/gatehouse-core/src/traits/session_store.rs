//! Session store port
//!
//! A key/value store for session state plus the counters used for login
//! throttling. Two backends implement it in `gatehouse-cache`: an in-process
//! map for tests and single-node deployments, and Redis for shared state.
//!
//! Session state is stored as JSON. `get_raw` resets the entry's lifetime
//! (sliding expiry) on every successful read.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::value_objects::SessionToken;

/// Errors returned by session stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No state exists under the token (never saved, deleted, or expired)
    #[error("No session state found")]
    NotFound,

    #[error("Session store backend error: {0}")]
    Backend(String),

    #[error("Session state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a backend error from anything displayable
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store serialized state under `token`, replacing any existing value
    async fn save_raw(&self, token: &SessionToken, state: String) -> StoreResult<()>;

    /// Fetch serialized state and refresh its lifetime
    ///
    /// Returns `StoreError::NotFound` when nothing is stored under `token`.
    async fn get_raw(&self, token: &SessionToken) -> StoreResult<String>;

    /// Remove state under `token`. Deleting an absent key succeeds.
    async fn delete(&self, token: &SessionToken) -> StoreResult<()>;

    /// Add `delta` to the failure counter for `key` and return the new count
    ///
    /// A `delta` of zero reads the counter without changing it. When the
    /// count reaches the configured maximum the backend arms the lockout
    /// expiry on the counter.
    async fn increment_failures(&self, key: &str, delta: i64) -> StoreResult<i64>;

    /// Time remaining before the counter for `key` expires
    ///
    /// Zero when there is no counter or it carries no expiry.
    async fn time_until_unlocked(&self, key: &str) -> StoreResult<Duration>;

    /// Drop the failure counter for `key`
    async fn clear_failures(&self, key: &str) -> StoreResult<()>;
}

/// Typed helpers over [`SessionStore`]
#[async_trait]
pub trait SessionStoreExt: SessionStore {
    /// Serialize `state` to JSON and save it under `token`
    async fn save_state<S>(&self, token: &SessionToken, state: &S) -> StoreResult<()>
    where
        S: Serialize + Sync + ?Sized,
    {
        let json = serde_json::to_string(state)?;
        self.save_raw(token, json).await
    }

    /// Load and deserialize the state under `token`
    async fn get_state<S>(&self, token: &SessionToken) -> StoreResult<S>
    where
        S: DeserializeOwned + Send,
    {
        let json = self.get_raw(token).await?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl<T: SessionStore + ?Sized> SessionStoreExt for T {}
