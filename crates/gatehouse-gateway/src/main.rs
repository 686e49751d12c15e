//! Gatehouse gateway entry point
//!
//! Run with:
//! ```bash
//! SESSION_KEY=... cargo run -p gatehouse-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use gatehouse_common::{init_tracing, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Load configuration before tracing so the log format follows APP_ENV
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        port = config.gateway.port,
        store = ?config.session.store,
        services = config.services.len(),
        "Configuration loaded"
    );

    // Run the gateway server
    if let Err(e) = gatehouse_gateway::run(config).await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}
