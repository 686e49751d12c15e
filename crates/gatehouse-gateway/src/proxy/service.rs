//! Round-robin service proxy

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use gatehouse_common::{AppError, ServiceRoute};
use parking_lot::Mutex;

use super::HOP_BY_HOP;
use crate::response::ApiError;
use crate::sessions::SessionManager;

/// Header carrying the authenticated user snapshot to backends
pub const X_USER: &str = "x-user";

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Largest request body buffered for forwarding (10 MiB)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Forwards requests for one path prefix to a pool of backend instances
pub struct ServiceProxy {
    prefix: String,
    /// Base URLs, e.g. `http://10.0.0.5:8080`
    backends: Vec<String>,
    /// Turns handed out so far; turn `n` goes to `backends[n % len]`
    turns: Mutex<usize>,
    client: reqwest::Client,
    sessions: SessionManager,
}

impl ServiceProxy {
    /// Create a proxy for `route`
    ///
    /// # Errors
    /// Returns `AppError::Config` when the route lists no backends
    pub fn new(
        route: &ServiceRoute,
        client: reqwest::Client,
        sessions: SessionManager,
    ) -> Result<Self, AppError> {
        if route.addrs.is_empty() {
            return Err(AppError::Config(format!(
                "service {} has no backend addresses",
                route.prefix
            )));
        }

        let backends = route
            .addrs
            .iter()
            .map(|addr| {
                if addr.contains("://") {
                    addr.trim_end_matches('/').to_string()
                } else {
                    format!("http://{addr}")
                }
            })
            .collect();

        Ok(Self {
            prefix: route.prefix.clone(),
            backends,
            turns: Mutex::new(0),
            client,
            sessions,
        })
    }

    /// Path prefix this proxy serves
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Pick the next backend
    pub fn next_backend(&self) -> &str {
        self.take_turn().1
    }

    /// Claim the next turn and the backend it lands on
    ///
    /// Read and advance happen under one lock, so concurrent callers get
    /// consecutive turns.
    fn take_turn(&self) -> (usize, &str) {
        let mut turns = self.turns.lock();
        let turn = *turns;
        *turns = turn.wrapping_add(1);
        (turn, &self.backends[turn % self.backends.len()])
    }

    /// Forward `request` to the next backend and relay its response
    ///
    /// Client-supplied `X-User` headers are always dropped. If the request
    /// carries a valid session the user snapshot is attached; otherwise the
    /// request is forwarded anonymously and the backend decides. Transport
    /// failures become a generic 502.
    pub async fn forward(&self, request: Request) -> Response {
        let backend = self.next_backend().to_string();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let (parts, body) = request.into_parts();
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(X_USER);

        match self.sessions.resolve(&headers, &parts.uri).await {
            Ok(state) => match state.user.to_json() {
                Ok(json) => match HeaderValue::from_bytes(json.as_bytes()) {
                    Ok(value) => {
                        headers.insert(X_USER, value);
                    }
                    Err(e) => tracing::warn!(error = %e, "User snapshot is not a valid header value"),
                },
                Err(e) => tracing::warn!(error = %e, "Failed to serialize user snapshot"),
            },
            Err(e) if e.is_unauthenticated() => {
                tracing::trace!(error = %e, "Forwarding without user identity");
            }
            Err(e) => return ApiError::from(e).into_response(),
        }

        if let Some(peer) = peer {
            append_forwarded_for(&mut headers, peer);
        }

        let body = match to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting request body");
                return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
            }
        };

        let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let url = format!("{backend}{path}");

        tracing::debug!(
            service = %self.prefix,
            method = %parts.method,
            url = %url,
            "Forwarding request"
        );

        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(service = %self.prefix, backend = %backend, error = %e, "Backend request failed");
                return ApiError::from(AppError::BadGateway).into_response();
            }
        };

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        match upstream.bytes().await {
            Ok(bytes) => {
                let mut response = Response::new(Body::from(bytes));
                *response.status_mut() = status;
                *response.headers_mut() = response_headers;
                response
            }
            Err(e) => {
                tracing::warn!(service = %self.prefix, backend = %backend, error = %e, "Backend response body failed");
                ApiError::from(AppError::BadGateway).into_response()
            }
        }
    }
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("prefix", &self.prefix)
            .field("backends", &self.backends)
            .finish()
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let client = peer.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {client}"),
        _ => client,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
