//! Configuration structs

mod app_config;

pub use app_config::{
    parse_service_routes, AppConfig, AppSettings, ConfigError, Environment, ProxyConfig,
    QueueConfig, RedisConfig, ServerConfig, ServiceRoute, SessionConfig, StoreBackend,
};
