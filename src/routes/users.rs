use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{PublicUser, UserRepository};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::AppState;

/// Router for user-related endpoints (searching users)
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(search_users))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Query string to search for (username or email)
    pub q: Option<String>,
    /// Maximum number of results to return
    pub limit: Option<u32>,
}

/// Search users by username or email.
/// Requires authentication. Returns an empty array for empty/too-short queries.
async fn search_users(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<PublicUser>>> {
    let q = query.q.unwrap_or_default().trim().to_string();

    // Avoid performing searches for very short queries
    if q.len() < 2 {
        return Ok(Json(Vec::new()));
    }

    let limit = query.limit.unwrap_or(10).min(50) as i64;

    let users = UserRepository::search(&state.db, &q, limit).await?;
    let res: Vec<PublicUser> = users
        .into_iter()
        .filter(|u| u.id != user.id)
        .map(Into::into)
        .collect();

    Ok(Json(res))
}
