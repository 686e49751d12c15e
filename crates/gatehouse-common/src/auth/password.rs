//! Argon2id password hashing
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`), the format user seed
//! files carry in `passHash`.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AppError;

/// Hash `password` with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Check `password` against a PHC hash
///
/// `Ok(false)` is a wrong password; `Err` means `hash` itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::internal(anyhow::anyhow!("malformed password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Spend one Argon2 verification on a throwaway hash
///
/// The unknown-email login path calls this so it takes as long as a real
/// password check.
pub fn dummy_verify(password: &str) {
    let hash = DUMMY_HASH.get_or_init(|| hash_password("gatehouse-dummy-password").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}
