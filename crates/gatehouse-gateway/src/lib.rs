//! # gatehouse-gateway
//!
//! API gateway in front of the backend services:
//!
//! - **Sessions**: HMAC-signed session tokens, login throttling
//! - **Reverse proxy**: round-robin forwarding with `X-User` identity injection
//! - **User search**: prefix index over user names
//! - **Notifications**: WebSocket fan-out of queue messages

pub mod directory;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod notifier;
pub mod proxy;
pub mod response;
pub mod server;
pub mod sessions;

pub use directory::MemoryUserDirectory;
pub use server::{
    create_app, create_gateway_state, create_router, run, run_server, spawn_consumer,
    spawn_purge_task, GatewayState,
};
