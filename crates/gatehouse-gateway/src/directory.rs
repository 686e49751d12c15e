//! In-memory user directory
//!
//! User records belong to the user service. The gateway only needs to read
//! them; this directory holds a snapshot loaded from a JSON seed file:
//!
//! ```json
//! [
//!   {"id": 1, "email": "ada@example.com", "userName": "ada",
//!    "firstName": "Ada", "lastName": "Lovelace", "password": "s3cret"}
//! ]
//! ```
//!
//! Each entry carries either a plain `password` (hashed on load) or a
//! `passHash` already in PHC format.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use gatehouse_common::{hash_password, AppError};
use gatehouse_core::{DirectoryResult, User, UserDirectory, UserRecord};
use parking_lot::RwLock;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedUser {
    #[serde(flatten)]
    user: User,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    pass_hash: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    by_id: BTreeMap<i64, UserRecord>,
    /// Lower-cased email to id
    by_email: HashMap<String, i64>,
}

/// User directory held in process memory
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    inner: RwLock<Inner>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record
    pub fn insert(&self, record: UserRecord) {
        let mut inner = self.inner.write();
        if let Some(previous) = inner.by_id.get(&record.user.id) {
            let old_email = previous.user.email.to_lowercase();
            inner.by_email.remove(&old_email);
        }
        inner
            .by_email
            .insert(record.user.email.to_lowercase(), record.user.id);
        inner.by_id.insert(record.user.id, record);
    }

    /// Add a user with a plain-text password, hashing it
    pub fn insert_with_password(&self, user: User, password: &str) -> Result<(), AppError> {
        let pass_hash = hash_password(password)?;
        self.insert(UserRecord { user, pass_hash });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_id.is_empty()
    }

    /// Parse seed JSON (see the module docs for the format)
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let seeds: Vec<SeedUser> = serde_json::from_str(json)
            .map_err(|e| AppError::Config(format!("invalid user seed data: {e}")))?;

        let directory = Self::new();
        for seed in seeds {
            let pass_hash = match (seed.pass_hash, seed.password) {
                (Some(hash), _) => hash,
                (None, Some(password)) => hash_password(&password)?,
                (None, None) => {
                    return Err(AppError::Config(format!(
                        "seed user {} has neither password nor passHash",
                        seed.user.id
                    )))
                }
            };
            directory.insert(UserRecord {
                user: seed.user,
                pass_hash,
            });
        }
        Ok(directory)
    }

    /// Load a seed file from disk
    pub fn load_seed_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read user seed file {}: {e}", path.display()))
        })?;
        let directory = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), users = directory.len(), "Loaded user seed file");
        Ok(directory)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<UserRecord>> {
        let inner = self.inner.read();
        Ok(inner
            .by_email
            .get(&email.trim().to_lowercase())
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> DirectoryResult<Vec<User>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .map(|record| record.user.clone())
            .collect())
    }

    async fn all(&self) -> DirectoryResult<Vec<User>> {
        Ok(self
            .inner
            .read()
            .by_id
            .values()
            .map(|record| record.user.clone())
            .collect())
    }
}
