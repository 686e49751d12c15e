//! Session issue / resolve / revoke

use std::sync::Arc;

use axum::{
    extract::Query,
    http::{header::AUTHORIZATION, HeaderMap, Uri},
};
use gatehouse_common::SessionSigner;
use gatehouse_core::{SessionState, SessionStore, SessionStoreExt, SessionToken};
use serde::Deserialize;

use super::SessionError;

/// Authorization scheme prefix, including the trailing space
pub const BEARER_PREFIX: &str = "Bearer ";

/// Query parameter consulted when no `Authorization` header is sent
///
/// Browsers cannot set headers on WebSocket upgrades.
pub const AUTH_QUERY_PARAM: &str = "auth";

#[derive(Debug, Deserialize)]
struct AuthQuery {
    auth: Option<String>,
}

/// Issues and resolves sessions against a signer and a store
#[derive(Clone)]
pub struct SessionManager {
    signer: SessionSigner,
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(signer: SessionSigner, store: Arc<dyn SessionStore>) -> Self {
        Self { signer, store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Mint a token and save `state` under it
    pub async fn begin(&self, state: &SessionState) -> Result<SessionToken, SessionError> {
        let token = self.signer.generate();
        self.store.save_state(&token, state).await?;

        tracing::debug!(user_id = %state.user_id(), "Session started");
        Ok(token)
    }

    /// Extract and validate the token carried by a request
    ///
    /// The `Authorization` header wins; the `auth` query parameter is only
    /// read when the header is absent or empty, and may carry the token with
    /// or without the `Bearer ` prefix.
    pub fn token_from_request(&self, headers: &HeaderMap, uri: &Uri) -> Result<SessionToken, SessionError> {
        let header = headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str().map_err(|_| SessionError::InvalidScheme))
            .transpose()?
            .filter(|v| !v.is_empty());

        let encoded = match header {
            Some(value) => value
                .strip_prefix(BEARER_PREFIX)
                .ok_or(SessionError::InvalidScheme)?
                .to_string(),
            None => {
                let query = Query::<AuthQuery>::try_from_uri(uri)
                    .map_err(|_| SessionError::NoCredential)?;
                let value = query.0.auth.filter(|v| !v.is_empty()).ok_or(SessionError::NoCredential)?;
                match value.strip_prefix(BEARER_PREFIX) {
                    Some(stripped) => stripped.to_string(),
                    None => value,
                }
            }
        };

        Ok(self.signer.validate(&encoded)?)
    }

    /// Load the session state for the request's token
    ///
    /// A successful load slides the session's expiry forward.
    pub async fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Result<SessionState, SessionError> {
        let token = self.token_from_request(headers, uri)?;
        Ok(self.store.get_state(&token).await?)
    }

    /// Delete the session state for the request's token
    ///
    /// Only the signature is checked; revoking an already expired session
    /// succeeds.
    pub async fn end(&self, headers: &HeaderMap, uri: &Uri) -> Result<SessionToken, SessionError> {
        let token = self.token_from_request(headers, uri)?;
        self.store.delete(&token).await?;

        tracing::debug!("Session ended");
        Ok(token)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("signer", &self.signer)
            .field("store", &"dyn SessionStore")
            .finish()
    }
}
