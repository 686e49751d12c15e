//! Authentication utilities

mod password;
mod session_token;

pub use password::{dummy_verify, hash_password, verify_password};
pub use session_token::{SessionSigner, TokenError, ID_LENGTH};
