use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{ConversationPeer, Message, MessageRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(send_message))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:user_id", get(get_conversation))
        .route("/conversations/:user_id/read", patch(mark_conversation_read))
        .route("/unread", get(list_unread))
        .route("/unread/count", get(count_unread))
        .route("/:id/read", patch(mark_read))
        .route("/:id", delete(delete_message))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub content: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Send a direct message. The receiver must exist; a dangling id surfaces as
/// ReferenceNotFound rather than a raw constraint error.
async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }
    if request.receiver_id == user.id {
        return Err(AppError::BadRequest(
            "You cannot send a message to yourself".to_string(),
        ));
    }

    UserRepository::find_by_id(&state.db, &request.receiver_id)
        .await?
        .ok_or_else(|| {
            AppError::ReferenceNotFound("The recipient user does not exist".to_string())
        })?;

    let message =
        MessageRepository::create(&state.db, &user.id, &request.receiver_id, content).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<ConversationPeer>>> {
    let peers = MessageRepository::list_conversations(&state.db, &user.id).await?;
    Ok(Json(peers))
}

/// Full message history with one peer. Only messages the caller sent or
/// received can ever match, so no separate access check is needed.
async fn get_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = MessageRepository::list_between(&state.db, &user.id, &user_id).await?;
    Ok(Json(messages))
}

/// Mark one message as read. Receiver only; senders and third parties get
/// NotFound, same as for a missing message.
async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let updated = MessageRepository::mark_read(&state.db, &id, &user.id).await?;
    if !updated {
        return Err(AppError::NotFound("Message not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Message marked as read" })))
}

async fn mark_conversation_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let count = MessageRepository::mark_conversation_read(&state.db, &user.id, &user_id).await?;
    Ok(Json(serde_json::json!({ "message": "Conversation marked as read", "updated": count })))
}

/// Delete a message. Either participant may remove it; the row disappears
/// for both.
async fn delete_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = MessageRepository::delete(&state.db, &id, &user.id).await?;
    if !deleted {
        return Err(AppError::NotFound("Message not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Message deleted" })))
}

async fn list_unread(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Message>>> {
    let messages = MessageRepository::list_unread(&state.db, &user.id).await?;
    Ok(Json(messages))
}

async fn count_unread(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let count = MessageRepository::count_unread(&state.db, &user.id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}
