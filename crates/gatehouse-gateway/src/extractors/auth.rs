//! Authentication extractor
//!
//! Resolves the request's session token (header or `auth` query parameter)
//! to its stored session state.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use gatehouse_core::SessionState;

use crate::response::ApiError;
use crate::server::GatewayState;

/// Session of the authenticated caller
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionState);

impl AuthSession {
    pub fn user_id(&self) -> i64 {
        self.0.user_id()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    GatewayState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = GatewayState::from_ref(state);

        let session = app_state
            .sessions()
            .resolve(&parts.headers, &parts.uri)
            .await?;

        Ok(Self(session))
    }
}
