//! Response types and error handling for gateway endpoints
//!
//! Every error leaves the gateway as `{"error": {"code", "message"}}` with
//! the matching status code. Rate-limited responses also carry `Retry-After`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gatehouse_common::{AppError, ErrorResponse};
use gatehouse_core::DomainError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::sessions::SessionError;

/// API error type for consistent error responses
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    App(#[from] AppError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        let code = match self {
            Self::App(e) => e.status_code(),
            Self::Session(e) => match e {
                SessionError::RateLimited { .. } => 429,
                SessionError::Store(_) => 500,
                _ => 401,
            },
            Self::Domain(e) => e.status_code(),
            Self::Internal(_) => 500,
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::App(e) => e,
            ApiError::Session(e) => e.into(),
            ApiError::Domain(e) => Self::Domain(e),
            ApiError::Internal(e) => Self::Internal(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = ?self, "Server error occurred");
        } else if status == StatusCode::UNAUTHORIZED {
            debug!(error = %self, "Request not authenticated");
        }

        // Session errors are reported through their public AppError form so
        // token failures never say what was wrong with the token.
        let app = AppError::from(self);
        let retry_after = app.retry_after();
        let body = ErrorBody {
            error: ErrorResponse::from(&app),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
