//! Session errors

use std::time::Duration;

use gatehouse_common::{AppError, TokenError};
use gatehouse_core::StoreError;

/// Errors raised while issuing, resolving or revoking sessions
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Neither an `Authorization` header nor an `auth` query parameter
    #[error("No session token in request")]
    NoCredential,

    #[error("Authorization scheme must be Bearer")]
    InvalidScheme,

    #[error(transparent)]
    InvalidToken(#[from] TokenError),

    /// The token is authentic but its state expired or was revoked
    #[error("No session state for token")]
    StateNotFound,

    #[error("Login attempts locked for {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Session store error: {0}")]
    Store(StoreError),
}

impl SessionError {
    /// Whether the request should be treated as unauthenticated
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::InvalidScheme | Self::InvalidToken(_) | Self::StateNotFound
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            Self::StateNotFound
        } else {
            Self::Store(err)
        }
    }
}

/// Whole seconds to wait, rounded up, never zero
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoCredential | SessionError::InvalidScheme => Self::MissingAuth,
            SessionError::InvalidToken(_) | SessionError::StateNotFound => Self::InvalidToken,
            SessionError::RateLimited { retry_after } => Self::RateLimited {
                retry_after_secs: retry_after_secs(retry_after),
            },
            SessionError::Store(e) => Self::Cache(e.to_string()),
        }
    }
}
