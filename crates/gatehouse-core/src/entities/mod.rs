//! Domain entities - core business objects

mod session;
mod user;

pub use session::SessionState;
pub use user::User;
