//! # gatehouse-common
//!
//! Shared utilities including configuration, error handling, session token
//! signing, password hashing, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{dummy_verify, hash_password, verify_password, SessionSigner, TokenError, ID_LENGTH};
pub use config::{
    AppConfig, AppSettings, ConfigError, Environment, ProxyConfig, QueueConfig, RedisConfig,
    ServerConfig, ServiceRoute, SessionConfig, StoreBackend,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{init_tracing, TracingConfig, TracingError};
