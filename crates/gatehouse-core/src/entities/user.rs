//! User entity - the public profile snapshot carried in sessions and `X-User`

use serde::{Deserialize, Serialize};

/// Public user profile
///
/// This is the snapshot copied into a session at login and forwarded to
/// backends as JSON. Credential material never lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
}

impl User {
    /// Create a new User with required fields
    pub fn new(
        id: i64,
        email: impl Into<String>,
        user_name: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            email: email.into(),
            user_name: user_name.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            photo_url: String::new(),
        }
    }

    /// Set the profile photo URL
    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = url.into();
        self
    }

    /// Display name: "First Last", falling back to the user name
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.user_name.clone()
        } else {
            full.to_string()
        }
    }

    /// Serialize the snapshot as compact JSON (the `X-User` header value)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
