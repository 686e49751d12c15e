//! User directory port
//!
//! The gateway does not own user records. It needs three lookups: credentials
//! by email for login, profiles by id for search results, and a full scan to
//! seed the prefix index at startup.

use async_trait::async_trait;

use crate::entities::User;
use crate::error::DomainError;

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DomainError>;

/// A user together with the stored password hash
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub pass_hash: String,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user and their password hash by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> DirectoryResult<Option<UserRecord>>;

    /// Fetch profiles for `ids`, in the order given, skipping unknown ids
    async fn find_by_ids(&self, ids: &[i64]) -> DirectoryResult<Vec<User>>;

    /// Every known profile
    async fn all(&self) -> DirectoryResult<Vec<User>>;
}
