//! Session state stored under each issued token

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::User;

/// State recorded for an authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub begin_time: DateTime<Utc>,
    pub user: User,
}

impl SessionState {
    /// Start a session for `user` now
    pub fn new(user: User) -> Self {
        Self {
            begin_time: Utc::now(),
            user,
        }
    }

    /// ID of the user owning this session
    #[inline]
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}
