//! Session handlers: sign in and sign out

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use gatehouse_common::{dummy_verify, verify_password, AppError};
use gatehouse_core::{DomainError, SessionState, User};
use serde::Deserialize;

use crate::extractors::ClientKey;
use crate::response::ApiError;
use crate::server::GatewayState;

/// Path segment naming the caller's own session
pub const OWN_SESSION: &str = "mine";

/// Login request body
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Sign in
///
/// POST /v1/sessions
///
/// On success responds `201` with the user snapshot as JSON and the session
/// token in the `Authorization` header. Unknown emails and wrong passwords
/// are indistinguishable: both cost one Argon2 verification, count as a
/// failed attempt, and answer `401`.
pub async fn begin_session(
    State(state): State<GatewayState>,
    client: ClientKey,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(credentials) = payload.map_err(|rejection| match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            AppError::UnsupportedMediaType("request body must be application/json".to_string())
        }
        other => AppError::validation(other.body_text()),
    })?;

    let throttle = state.throttle();
    throttle.check(client.as_str()).await?;

    let record = state.directory().find_by_email(&credentials.email).await?;
    let password = credentials.password;

    let Some(record) = record else {
        tokio::task::spawn_blocking(move || dummy_verify(&password))
            .await
            .map_err(ApiError::internal)?;
        throttle.record(client.as_str(), false).await?;

        tracing::info!(client = %client.as_str(), "Sign-in for unknown email");
        return Err(AppError::InvalidCredentials.into());
    };

    let user_id = record.user.id;
    let pass_hash = record.pass_hash;
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &pass_hash))
        .await
        .map_err(ApiError::internal)?
        .map_err(|_| DomainError::InvalidRecord(format!("password hash of user {user_id}")))?;

    throttle.record(client.as_str(), matched).await?;
    if !matched {
        tracing::info!(client = %client.as_str(), user_id = %user_id, "Sign-in with wrong password");
        return Err(AppError::InvalidCredentials.into());
    }
    throttle.clear(client.as_str()).await?;

    let session = SessionState::new(record.user);
    let token = state.sessions().begin(&session).await?;

    tracing::info!(user_id = %session.user_id(), "User signed in");

    let user: User = session.user;
    Ok((
        StatusCode::CREATED,
        [(header::AUTHORIZATION, token.bearer())],
        Json(user),
    ))
}

/// Sign out
///
/// DELETE /v1/sessions/mine
///
/// Only the caller's own session can be ended; any other id is `403`.
pub async fn end_session(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<&'static str, ApiError> {
    if id != OWN_SESSION {
        return Err(AppError::Forbidden("only your own session can be ended".to_string()).into());
    }

    state.sessions().end(&headers, &uri).await?;
    Ok("signed out")
}
