//! Client identity for login throttling
//!
//! The first `X-Forwarded-For` entry when the gateway sits behind a load
//! balancer, otherwise the peer address of the TCP connection. Clients can
//! write any `X-Forwarded-For` they like, so deployments without a proxy that
//! overwrites it set `TRUST_FORWARDED_FOR=false` and are keyed by peer only.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::server::GatewayState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Key failed logins are counted under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    /// Derive the key from request headers and the peer address
    ///
    /// `X-Forwarded-For` is consulted only when `trust_forwarded` is set.
    pub fn from_parts(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trust_forwarded: bool,
    ) -> Self {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .filter(|_| trust_forwarded)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let key = match (forwarded, peer) {
            (Some(client), _) => client.to_string(),
            (None, Some(addr)) => addr.ip().to_string(),
            (None, None) => "unknown".to_string(),
        };
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
    GatewayState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trust_forwarded = GatewayState::from_ref(state)
            .config()
            .session
            .trust_forwarded_for;
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_parts(&parts.headers, peer, trust_forwarded))
    }
}
