//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub session: SessionConfig,
    /// Present when `REDIS_URL` is set; required by the Redis store and the queue consumer
    pub redis: Option<RedisConfig>,
    pub queue: QueueConfig,
    pub proxy: ProxyConfig,
    /// Backend services reachable through the reverse proxy
    #[serde(default)]
    pub services: Vec<ServiceRoute>,
    /// JSON file of users loaded into the in-memory directory at startup
    #[serde(default)]
    pub user_seed_file: Option<PathBuf>,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Listen address
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which session store backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl StoreBackend {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Session token and login throttling settings
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC key used to sign session tokens
    pub signing_key: String,
    #[serde(default)]
    pub store: StoreBackend,
    /// Sliding lifetime of session state
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Failed logins allowed before the lockout is armed
    #[serde(default = "default_max_login_failures")]
    pub max_login_failures: i64,
    /// How long a lockout lasts once armed
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    /// Key login failures by the first `X-Forwarded-For` entry; only safe
    /// when a proxy in front of the gateway overwrites that header
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("signing_key", &"<redacted>")
            .field("store", &self.store)
            .field("ttl_secs", &self.ttl_secs)
            .field("max_login_failures", &self.max_login_failures)
            .field("lockout_secs", &self.lockout_secs)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish()
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Redis Stream consumer settings for the notification queue
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_queue_stream")]
    pub stream: String,
    #[serde(default = "default_queue_group")]
    pub group: String,
    #[serde(default = "default_queue_consumer")]
    pub consumer: String,
    #[serde(default = "default_queue_block_ms")]
    pub block_ms: u64,
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stream: default_queue_stream(),
            group: default_queue_group(),
            consumer: default_queue_consumer(),
            block_ms: default_queue_block_ms(),
            batch_size: default_queue_batch_size(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Reverse proxy settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_proxy_timeout(),
        }
    }
}

/// A path prefix served by a pool of backend instances
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceRoute {
    /// Path prefix, e.g. `/v1/channels`
    pub prefix: String,
    /// `host:port` of each instance
    pub addrs: Vec<String>,
}

impl ServiceRoute {
    /// Parse a comma-delimited address list for `prefix`
    ///
    /// Blank entries are ignored. An empty result is an error.
    pub fn new(prefix: &str, addrs: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.trim().trim_end_matches('/');
        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "SERVICE_ROUTES",
                format!("prefix {prefix:?} must start with '/'"),
            ));
        }

        let addrs: Vec<String> = addrs
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect();
        if addrs.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVICE_ROUTES",
                format!("no backend addresses for {prefix}"),
            ));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            addrs,
        })
    }
}

/// Parse `"/v1/a=host1:80,host2:80;/v1/b=host3:80"` into routes
pub fn parse_service_routes(raw: &str) -> Result<Vec<ServiceRoute>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, addrs) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidValue("SERVICE_ROUTES", format!("missing '=' in {entry:?}"))
            })?;
            ServiceRoute::new(prefix, addrs)
        })
        .collect()
}

// Default value functions
fn default_app_name() -> String {
    "gatehouse".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_session_ttl() -> u64 {
    3600 // 1 hour
}

fn default_max_login_failures() -> i64 {
    5
}

fn default_lockout_secs() -> u64 {
    600 // 10 minutes
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_queue_stream() -> String {
    "events".to_string()
}

fn default_queue_group() -> String {
    "gateway".to_string()
}

fn default_queue_consumer() -> String {
    "gateway-1".to_string()
}

fn default_queue_block_ms() -> u64 {
    5000
}

fn default_queue_batch_size() -> usize {
    16
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_proxy_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source
    ///
    /// Unset variables fall back to their defaults; set but unparsable ones
    /// are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing_key = lookup("SESSION_KEY").ok_or(ConfigError::MissingVar("SESSION_KEY"))?;
        if signing_key.is_empty() {
            return Err(ConfigError::InvalidValue("SESSION_KEY", "must not be empty".to_string()));
        }

        let store = match lookup("SESSION_STORE") {
            Some(s) => {
                StoreBackend::parse(&s).ok_or(ConfigError::InvalidValue("SESSION_STORE", s))?
            }
            None => StoreBackend::default(),
        };

        let redis = match lookup("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: positive_var(
                    &lookup,
                    "REDIS_MAX_CONNECTIONS",
                    default_redis_max_connections,
                )?,
            }),
            None => None,
        };

        let queue = QueueConfig {
            enabled: parsed_var(&lookup, "QUEUE_ENABLED", default_true)?,
            stream: lookup("QUEUE_STREAM").unwrap_or_else(default_queue_stream),
            group: lookup("QUEUE_GROUP").unwrap_or_else(default_queue_group),
            consumer: lookup("QUEUE_CONSUMER").unwrap_or_else(default_queue_consumer),
            block_ms: parsed_var(&lookup, "QUEUE_BLOCK_MS", default_queue_block_ms)?,
            batch_size: positive_var(&lookup, "QUEUE_BATCH_SIZE", default_queue_batch_size)?,
            reconnect_delay_ms: parsed_var(
                &lookup,
                "QUEUE_RECONNECT_DELAY_MS",
                default_reconnect_delay_ms,
            )?,
        };

        if redis.is_none() && (store == StoreBackend::Redis || queue.enabled) {
            return Err(ConfigError::MissingVar("REDIS_URL"));
        }

        let services = match lookup("SERVICE_ROUTES") {
            Some(s) => parse_service_routes(&s)?,
            None => Vec::new(),
        };

        let env = match lookup("APP_ENV") {
            Some(s) => Environment::parse(&s).ok_or(ConfigError::InvalidValue("APP_ENV", s))?,
            None => Environment::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parsed_var(&lookup, "GATEWAY_PORT", default_port)?,
            },
            session: SessionConfig {
                signing_key,
                store,
                // Redis rejects `SET EX 0`, and a zero lockout expires as it is armed
                ttl_secs: positive_var(&lookup, "SESSION_TTL_SECS", default_session_ttl)?,
                max_login_failures: positive_var(
                    &lookup,
                    "MAX_LOGIN_FAILURES",
                    default_max_login_failures,
                )?,
                lockout_secs: positive_var(&lookup, "LOGIN_LOCKOUT_SECS", default_lockout_secs)?,
                trust_forwarded_for: parsed_var(&lookup, "TRUST_FORWARDED_FOR", default_true)?,
            },
            redis,
            queue,
            proxy: ProxyConfig {
                timeout_secs: positive_var(&lookup, "PROXY_TIMEOUT_SECS", default_proxy_timeout)?,
            },
            services,
            user_seed_file: lookup("USER_SEED_FILE").map(PathBuf::from),
        })
    }

    /// Self-contained configuration: in-memory store, no Redis, no queue
    ///
    /// Used by tests and single-node development setups.
    #[must_use]
    pub fn local(signing_key: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::Development,
            },
            gateway: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            session: SessionConfig {
                signing_key: signing_key.into(),
                store: StoreBackend::Memory,
                ttl_secs: default_session_ttl(),
                max_login_failures: default_max_login_failures(),
                lockout_secs: default_lockout_secs(),
                trust_forwarded_for: true,
            },
            redis: None,
            queue: QueueConfig {
                enabled: false,
                ..QueueConfig::default()
            },
            proxy: ProxyConfig::default(),
            services: Vec::new(),
            user_seed_file: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Parse `name` when set, else use `default`
fn parsed_var<T, F>(lookup: &F, name: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        None => Ok(default()),
    }
}

/// Like [`parsed_var`], but the value must be at least one
fn positive_var<T, F>(lookup: &F, name: &'static str, default: fn() -> T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8>,
    F: Fn(&str) -> Option<String>,
{
    let value = parsed_var(lookup, name, default)?;
    if value < T::from(1) {
        return Err(ConfigError::InvalidValue(name, "must be at least 1".to_string()));
    }
    Ok(value)
}
