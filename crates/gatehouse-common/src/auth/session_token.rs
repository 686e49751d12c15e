//! Signed session tokens
//!
//! A token is `ID_LENGTH` cryptographically random bytes followed by the
//! HMAC-SHA256 of those bytes, base64url-encoded with padding:
//!
//! ```text
//! +---------------------------+-----------------------------+
//! | 32 random identifier bytes| HMAC-SHA256(key, id bytes)  |
//! +---------------------------+-----------------------------+
//! ```
//!
//! Tokens carry no claims. Everything about the session lives in the store.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use gatehouse_core::SessionToken;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of the random identifier portion
pub const ID_LENGTH: usize = 32;

/// Length of the decoded token (identifier plus signature)
const SIGNED_LENGTH: usize = ID_LENGTH + 32;

/// Token errors
///
/// These deliberately say nothing about which bytes failed to match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Signing key must not be empty")]
    EmptyKey,

    #[error("Session token is empty")]
    Empty,

    #[error("Session token is not valid base64url")]
    Malformed,

    #[error("Session token has the wrong length")]
    InvalidLength,

    #[error("Session token signature is invalid")]
    InvalidSignature,
}

/// Mints and validates session tokens with a fixed HMAC key
#[derive(Clone)]
pub struct SessionSigner {
    /// Keyed MAC state, cloned for every computation
    mac: HmacSha256,
}

impl SessionSigner {
    /// Create a signer
    ///
    /// # Errors
    /// Returns `TokenError::EmptyKey` for a zero-length key
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(TokenError::EmptyKey);
        }
        let mac = HmacSha256::new_from_slice(key).map_err(|_| TokenError::EmptyKey)?;
        Ok(Self { mac })
    }

    /// Mint a fresh token
    pub fn generate(&self) -> SessionToken {
        let mut raw = [0u8; SIGNED_LENGTH];
        rand::thread_rng().fill_bytes(&mut raw[..ID_LENGTH]);

        let mut mac = self.mac.clone();
        mac.update(&raw[..ID_LENGTH]);
        raw[ID_LENGTH..].copy_from_slice(&mac.finalize().into_bytes());

        SessionToken::new(URL_SAFE.encode(raw))
    }

    /// Check that `encoded` was minted with this signer's key
    ///
    /// The signature comparison runs in constant time.
    pub fn validate(&self, encoded: &str) -> Result<SessionToken, TokenError> {
        if encoded.is_empty() {
            return Err(TokenError::Empty);
        }

        let raw = URL_SAFE.decode(encoded).map_err(|_| TokenError::Malformed)?;
        if raw.len() != SIGNED_LENGTH {
            return Err(TokenError::InvalidLength);
        }

        let (id, signature) = raw.split_at(ID_LENGTH);
        let mut mac = self.mac.clone();
        mac.update(id);
        mac.verify_slice(signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        Ok(SessionToken::new(encoded))
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("key", &"<redacted>")
            .finish()
    }
}
