//! HTTP handlers served by the gateway itself
//!
//! Everything else under a configured service prefix goes to the reverse
//! proxy.

mod health;
mod sessions;
mod users;
mod ws;

pub use health::{health_check, HealthResponse};
pub use sessions::{begin_session, end_session, Credentials, OWN_SESSION};
pub use users::{search_users, SearchQuery, SEARCH_LIMIT};
pub use ws::ws_handler;
