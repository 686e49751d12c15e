//! User search handler

use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    Json,
};
use gatehouse_common::AppError;
use gatehouse_core::User;
use serde::Deserialize;

use crate::extractors::AuthSession;
use crate::response::ApiError;
use crate::server::GatewayState;

/// Maximum users returned by one search
pub const SEARCH_LIMIT: usize = 20;

/// Query string for user search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Prefix search over user names and first/last name tokens
///
/// GET /v1/users?q=<prefix>
pub async fn search_users(
    State(state): State<GatewayState>,
    session: AuthSession,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let prefix = query
        .q
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::validation("query parameter q is required"))?;

    // A user indexed under several matching keys is listed once.
    let mut seen = HashSet::new();
    let ids: Vec<i64> = state
        .index()
        .find(&prefix, SEARCH_LIMIT)
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    let users = state.directory().find_by_ids(&ids).await?;

    tracing::debug!(
        user_id = %session.user_id(),
        prefix = %prefix,
        results = users.len(),
        "User search"
    );

    Ok(Json(users))
}
