//! Domain errors

use thiserror::Error;

/// Failures from user directory lookups
#[derive(Debug, Error)]
pub enum DomainError {
    /// A record the directory holds is unusable, e.g. a corrupt password hash
    #[error("Invalid user record: {0}")]
    InvalidRecord(String),
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRecord(_) => "INVALID_USER_RECORD",
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRecord(_) => 500,
        }
    }
}
