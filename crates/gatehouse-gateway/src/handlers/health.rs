//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::GatewayState;

/// Liveness response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Open WebSocket connections
    pub connections: usize,
}

/// Basic health check (liveness probe)
///
/// GET /health
pub async fn health_check(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.notifier().connection_count(),
    })
}
