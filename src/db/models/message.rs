use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

/// A conversation partner, as listed by GET /api/messages/conversations.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversationPeer {
    pub id: String,
    pub username: String,
}
