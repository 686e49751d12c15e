//! Gateway server setup
//!
//! Provides the router, dependency wiring and the server runner.

mod state;

pub use state::GatewayState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    routing::{any, delete, get, post},
    Router,
};
use gatehouse_cache::{
    create_shared_pool, MemoryStore, MessageSource, RedisPoolConfig, RedisStore,
    RedisStreamSource, SharedRedisPool, StorePolicy, StreamSourceConfig,
};
use gatehouse_common::{AppConfig, AppError, StoreBackend};
use gatehouse_core::SessionStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::directory::MemoryUserDirectory;
use crate::handlers::{begin_session, end_session, health_check, search_users, ws_handler};
use crate::middleware::apply_middleware;
use crate::notifier::Notifier;
use crate::proxy::ServiceProxy;

/// How often the in-memory store drops expired entries
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Paths served by the gateway itself; service prefixes may not shadow them
const RESERVED_PREFIXES: [&str; 4] = ["/health", "/v1/sessions", "/v1/users", "/v1/ws"];

/// Create the gateway router
pub fn create_router(proxies: &[Arc<ServiceProxy>]) -> Router<GatewayState> {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/v1/sessions", post(begin_session))
        .route("/v1/sessions/:id", delete(end_session))
        .route("/v1/users", get(search_users))
        .route("/v1/ws", get(ws_handler));

    for proxy in proxies {
        router = mount_proxy(router, proxy);
    }
    router
}

/// Route `<prefix>` and everything below it to `proxy`
fn mount_proxy(router: Router<GatewayState>, proxy: &Arc<ServiceProxy>) -> Router<GatewayState> {
    let prefix = proxy.prefix().to_string();
    let forward = {
        let proxy = Arc::clone(proxy);
        move |request: Request| async move { proxy.forward(request).await }
    };

    tracing::info!(prefix = %prefix, backends = proxy.backend_count(), "Proxying service");

    router
        .route(&prefix, any(forward.clone()))
        .route(&format!("{prefix}/*rest"), any(forward))
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    let router = create_router(state.proxies());
    apply_middleware(router).with_state(state)
}

/// Reject service prefixes that would collide with gateway routes or each other
fn validate_routes(config: &AppConfig) -> Result<(), AppError> {
    let mut seen = std::collections::HashSet::new();
    for route in &config.services {
        let reserved = RESERVED_PREFIXES
            .iter()
            .any(|r| route.prefix == *r || route.prefix.starts_with(&format!("{r}/")));
        if reserved || route.prefix == "/" {
            return Err(AppError::Config(format!(
                "service prefix {} collides with a gateway route",
                route.prefix
            )));
        }
        if !seen.insert(route.prefix.as_str()) {
            return Err(AppError::Config(format!(
                "service prefix {} is configured twice",
                route.prefix
            )));
        }
    }
    Ok(())
}

fn redis_pool(config: &AppConfig) -> Result<SharedRedisPool, AppError> {
    let redis = config
        .redis
        .as_ref()
        .ok_or_else(|| AppError::Config("REDIS_URL is required".to_string()))?;

    tracing::info!("Connecting to Redis...");
    create_shared_pool(RedisPoolConfig::from(redis)).map_err(|e| AppError::Cache(e.to_string()))
}

/// Initialize all dependencies and create `GatewayState`
///
/// Also starts the background tasks the configuration asks for: the
/// notification consumer and, for the in-memory store, the purge loop.
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    validate_routes(&config)?;

    let needs_redis = config.session.store == StoreBackend::Redis || config.queue.enabled;
    let pool = if needs_redis {
        Some(redis_pool(&config)?)
    } else {
        None
    };

    let policy = StorePolicy::from(&config.session);
    let store: Arc<dyn SessionStore> = match (config.session.store, &pool) {
        (StoreBackend::Redis, Some(pool)) => {
            pool.health_check()
                .await
                .map_err(|e| AppError::Cache(e.to_string()))?;
            tracing::info!("Redis connection established");
            Arc::new(RedisStore::new(Arc::clone(pool), policy))
        }
        (StoreBackend::Redis, None) => {
            return Err(AppError::Config("REDIS_URL is required".to_string()));
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory session store; sessions are not shared between instances");
            let store = Arc::new(MemoryStore::new(policy));
            spawn_purge_task(Arc::clone(&store));
            store
        }
    };

    let directory = match &config.user_seed_file {
        Some(path) => MemoryUserDirectory::load_seed_file(path)?,
        None => {
            tracing::warn!("No USER_SEED_FILE configured; user directory is empty");
            MemoryUserDirectory::new()
        }
    };

    let queue = config.queue.clone();
    let state = GatewayState::build(config, store, Arc::new(directory)).await?;

    if let (true, Some(pool)) = (queue.enabled, pool) {
        let source = RedisStreamSource::new(pool, StreamSourceConfig::from(&queue));
        tracing::info!(stream = %queue.stream, group = %queue.group, "Starting notification consumer");
        spawn_consumer(Arc::clone(state.notifier()), Arc::new(source));
    }

    Ok(state)
}

/// Run `notifier.consume(source)` on its own task
pub fn spawn_consumer(notifier: Arc<Notifier>, source: Arc<dyn MessageSource>) -> JoinHandle<()> {
    tokio::spawn(async move {
        notifier.consume(source.as_ref()).await;
    })
}

/// Periodically drop expired sessions and failure counters
pub fn spawn_purge_task(store: Arc<MemoryStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            store.purge_expired();
        }
    })
}

/// Run the gateway server
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid listen address {}: {e}", config.gateway.address())))?;

    // Create gateway state
    let state = create_gateway_state(config).await?;

    // Build application
    let app = create_app(state);

    // Run server
    run_server(app, addr).await
}
