use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{PublicUser, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an account and issue a session token.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let username = request.username.trim();
    let email = request.email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(AppError::Validation(
            "Username, email and password are required".to_string(),
        ));
    }
    if request.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    let password_hash = AuthService::hash_password(&request.password)?;
    let user = UserRepository::create(&state.db, username, &email, &password_hash).await?;
    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;

    tracing::info!("Registered new user {}", user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

/// Exchange credentials for a session token. Unknown email and wrong password
/// produce the same error, so the response does not leak which one failed.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = request.email.trim().to_lowercase();

    let user = UserRepository::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid credentials".to_string()))?;

    if !AuthService::verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid credentials".to_string()));
    }

    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

// ============================================================================
// Authenticated-user extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Extractor for authenticated user
pub struct AuthUser(pub crate::db::User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let user = AuthService::get_user_from_token(&state.db, &state.config.jwt, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                e
            })?;

        Ok(AuthUser(user))
    }
}
