//! Custom extractors for gateway handlers

mod auth;
mod client;

pub use auth::AuthSession;
pub use client::ClientKey;
