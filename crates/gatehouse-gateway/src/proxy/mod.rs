//! Reverse proxy for backend services
//!
//! One [`ServiceProxy`] per configured path prefix. Requests are spread over
//! the prefix's backend instances round-robin and carry the caller's
//! identity as an `X-User` JSON header.

mod service;

pub use service::{ServiceProxy, MAX_BODY_BYTES, X_USER};

/// Headers that describe a single hop and are never forwarded
pub(crate) const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];
