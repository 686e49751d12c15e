//! WebSocket upgrade handler

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};

use crate::extractors::AuthSession;
use crate::server::GatewayState;

/// Authenticated WebSocket endpoint
///
/// GET /v1/ws
///
/// The session is resolved before the upgrade, so unauthenticated clients
/// get a plain 401. Browsers pass the token as `?auth=<token>`.
pub async fn ws_handler(
    State(state): State<GatewayState>,
    session: AuthSession,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_id = session.user_id();
    let notifier = state.notifier().clone();

    ws.on_upgrade(move |socket| async move {
        notifier.register(user_id, socket);
    })
}
