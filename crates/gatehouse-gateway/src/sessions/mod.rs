//! Request-level session handling
//!
//! [`SessionManager`] issues, resolves and revokes signed session tokens on
//! top of a [`SessionStore`](gatehouse_core::SessionStore).
//! [`LoginThrottle`] counts failed logins per client and locks the client
//! out once the configured maximum is reached.

mod error;
mod manager;
mod throttle;

pub use error::SessionError;
pub use manager::{SessionManager, AUTH_QUERY_PARAM, BEARER_PREFIX};
pub use throttle::LoginThrottle;
