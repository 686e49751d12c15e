//! Test fixtures and data generators
//!
//! Provides the seeded users and request bodies shared by the suites.

use std::sync::OnceLock;

use gatehouse_common::hash_password;
use gatehouse_core::{User, UserRecord};
use serde::{Deserialize, Serialize};

/// A seeded user and their plain-text password
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub id: i64,
    pub email: &'static str,
    pub user_name: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub password: &'static str,
}

pub const ADA: Fixture = Fixture {
    id: 1,
    email: "ada@example.com",
    user_name: "ada",
    first_name: "Ada",
    last_name: "Lovelace",
    password: "analytical-engine",
};

pub const ALAN: Fixture = Fixture {
    id: 2,
    email: "alan@example.com",
    user_name: "turing",
    first_name: "Alan",
    last_name: "Turing",
    password: "enigma-machine",
};

pub const GRACE: Fixture = Fixture {
    id: 3,
    email: "grace@example.com",
    user_name: "grace",
    first_name: "Grace",
    last_name: "Hopper",
    password: "cobol-compiler",
};

pub const FIXTURES: [Fixture; 3] = [ADA, ALAN, GRACE];

impl Fixture {
    pub fn user(&self) -> User {
        User::new(
            self.id,
            self.email,
            self.user_name,
            self.first_name,
            self.last_name,
        )
    }

    pub fn login(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.to_string(),
            password: self.password.to_string(),
        }
    }

    pub fn wrong_login(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.to_string(),
            password: "definitely-wrong".to_string(),
        }
    }
}

static RECORDS: OnceLock<Vec<UserRecord>> = OnceLock::new();

/// Directory records for every fixture
///
/// Argon2 hashing is slow, so the hashes are computed once per test binary.
pub fn seeded_records() -> Vec<UserRecord> {
    RECORDS
        .get_or_init(|| {
            FIXTURES
                .iter()
                .map(|f| UserRecord {
                    user: f.user(),
                    pass_hash: hash_password(f.password).expect("hash fixture password"),
                })
                .collect()
        })
        .clone()
}

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// User snapshot as returned by the gateway
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
}

/// Error body returned by the gateway
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// A queue notification addressed to `user_ids` (everyone when empty)
pub fn notification(kind: &str, user_ids: &[i64]) -> String {
    if user_ids.is_empty() {
        serde_json::json!({ "type": kind }).to_string()
    } else {
        serde_json::json!({ "type": kind, "userIDs": user_ids }).to_string()
    }
}
