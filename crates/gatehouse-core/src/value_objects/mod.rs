//! Value objects - immutable types that represent domain concepts

mod session_token;

pub use session_token::SessionToken;
