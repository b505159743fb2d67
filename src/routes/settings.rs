use std::sync::Arc;

use axum::{
    extract::State,
    routing::{delete, get, patch, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{
    AppointmentRepository, MessageRepository, TaskRepository, UserRepository,
    UserSettingsRepository,
};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_settings))
        .route("/color/primary", patch(set_primary_color))
        .route("/color/secondary", patch(set_secondary_color))
        .route("/notifications", patch(set_notifications))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route("/export-data", get(export_data))
        .route("/account", delete(delete_account))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationsRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

fn validate_color(color: &str) -> AppResult<&str> {
    let color = color.trim();
    let valid_hex = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid_hex {
        return Err(AppError::Validation(
            "Color must be a #RRGGBB hex value".to_string(),
        ));
    }
    Ok(color)
}

// ============================================================================
// Handlers
// ============================================================================

/// Current settings for the user. A user who never changed anything has no
/// row; the response is then an all-null object, not an error.
async fn get_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let settings = UserSettingsRepository::find_for_user(&state.db, &user.id).await?;

    match settings {
        Some(s) => Ok(Json(serde_json::to_value(s).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to serialize settings: {e}"))
        })?)),
        None => Ok(Json(serde_json::json!({
            "userId": user.id,
            "theme": null,
            "primaryColor": null,
            "secondaryColor": null,
            "notificationsEnabled": null,
        }))),
    }
}

async fn set_primary_color(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ColorRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let color = validate_color(&request.color)?;
    UserSettingsRepository::set_primary_color(&state.db, &user.id, color).await?;
    Ok(Json(serde_json::json!({ "message": "Primary color updated" })))
}

async fn set_secondary_color(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ColorRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let color = validate_color(&request.color)?;
    UserSettingsRepository::set_secondary_color(&state.db, &user.id, color).await?;
    Ok(Json(serde_json::json!({ "message": "Secondary color updated" })))
}

async fn set_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<NotificationsRequest>,
) -> AppResult<Json<serde_json::Value>> {
    UserSettingsRepository::set_notifications_enabled(&state.db, &user.id, request.enabled).await?;
    Ok(Json(serde_json::json!({ "message": "Notification preference updated" })))
}

/// Update username/email. Pre-checks for another holder of the identity to
/// return a clean Conflict; the unique constraint backs the check up.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let username = request.username.trim();
    let email = request.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() {
        return Err(AppError::Validation(
            "Username and email are required".to_string(),
        ));
    }

    if UserRepository::identity_taken_by_other(&state.db, username, &email, &user.id).await? {
        return Err(AppError::Conflict(
            "This username or email is already in use".to_string(),
        ));
    }

    UserRepository::update_profile(&state.db, &user.id, username, &email).await?;

    Ok(Json(serde_json::json!({ "message": "Profile updated" })))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<PasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if request.new_password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    if !AuthService::verify_password(&request.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Current password is incorrect".to_string()));
    }

    let hash = AuthService::hash_password(&request.new_password)?;
    UserRepository::update_password_hash(&state.db, &user.id, &hash).await?;

    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}

/// Everything the account owns, as one JSON document.
async fn export_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let tasks = TaskRepository::list_for_owner(&state.db, &user.id).await?;
    let appointments = AppointmentRepository::list_for_owner(&state.db, &user.id).await?;
    let messages = MessageRepository::list_for_user(&state.db, &user.id).await?;
    let settings = UserSettingsRepository::find_for_user(&state.db, &user.id).await?;

    Ok(Json(serde_json::json!({
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
        },
        "settings": settings,
        "tasks": tasks,
        "appointments": appointments,
        "messages": messages,
    })))
}

/// Delete the account after re-checking the password. Owned rows go with the
/// user via cascading deletes.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<DeleteAccountRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !AuthService::verify_password(&request.password, &user.password_hash)? {
        return Err(AppError::BadRequest("Password is incorrect".to_string()));
    }

    let deleted = UserRepository::delete(&state.db, &user.id).await?;
    if !deleted {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("Account {} deleted", user.id);

    Ok(Json(serde_json::json!({ "message": "Account deleted" })))
}
