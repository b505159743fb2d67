use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{ConversationPeer, Message};
use crate::error::{AppError, AppResult};

// ============================================================================
// Message Repository
// ============================================================================

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, is_read, created_at";

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &SqlitePool,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
    ) -> AppResult<Message> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content, is_read, created_at)
            VALUES (?, ?, ?, ?, FALSE, ?)
            RETURNING {MESSAGE_COLUMNS}
            "#,
        ))
        .bind(&id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::from_user_write)
    }

    /// Distinct users this user has exchanged messages with, in either
    /// direction.
    pub async fn list_conversations(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<ConversationPeer>> {
        sqlx::query_as::<_, ConversationPeer>(
            r#"
            SELECT DISTINCT u.id, u.username
            FROM messages m JOIN users u ON m.sender_id = u.id
            WHERE m.receiver_id = ?
            UNION
            SELECT DISTINCT u.id, u.username
            FROM messages m JOIN users u ON m.receiver_id = u.id
            WHERE m.sender_id = ?
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// All messages between two users, oldest first.
    pub async fn list_between(
        pool: &SqlitePool,
        user_id: &str,
        peer_id: &str,
    ) -> AppResult<Vec<Message>> {
        sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
            ORDER BY created_at ASC
            "#,
        ))
        .bind(user_id)
        .bind(peer_id)
        .bind(peer_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Mark one message read. Only the receiver may do this; the predicate is
    /// part of the filter, so a sender or third party affects zero rows.
    pub async fn mark_read(pool: &SqlitePool, message_id: &str, receiver_id: &str) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE messages SET is_read = TRUE WHERE id = ? AND receiver_id = ?")
                .bind(message_id)
                .bind(receiver_id)
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every message from `peer_id` to this user as read.
    pub async fn mark_conversation_read(
        pool: &SqlitePool,
        receiver_id: &str,
        peer_id: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE WHERE receiver_id = ? AND sender_id = ?",
        )
        .bind(receiver_id)
        .bind(peer_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Delete a message. Sender or receiver only, enforced in the filter.
    pub async fn delete(pool: &SqlitePool, message_id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE id = ? AND (sender_id = ? OR receiver_id = ?)",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Every message the user sent or received, oldest first. Used by the
    /// account data export.
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Message>> {
        sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE sender_id = ? OR receiver_id = ?
            ORDER BY created_at ASC
            "#,
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_unread(pool: &SqlitePool, receiver_id: &str) -> AppResult<Vec<Message>> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id = ? AND is_read = FALSE"
        ))
        .bind(receiver_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_unread(pool: &SqlitePool, receiver_id: &str) -> AppResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = FALSE",
        )
        .bind(receiver_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::init::test_support::{seed_user, test_pool};

    #[tokio::test]
    async fn only_receiver_can_mark_read() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let msg = MessageRepository::create(&pool, &alice, &bob, "hi").await.unwrap();
        assert!(!msg.is_read);

        // sender cannot mark their own outgoing message read
        assert!(!MessageRepository::mark_read(&pool, &msg.id, &alice).await.unwrap());
        assert!(MessageRepository::mark_read(&pool, &msg.id, &bob).await.unwrap());

        let unread = MessageRepository::list_unread(&pool, &bob).await.unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn conversations_cover_both_directions() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;

        MessageRepository::create(&pool, &alice, &bob, "to bob").await.unwrap();
        MessageRepository::create(&pool, &carol, &alice, "from carol").await.unwrap();

        let mut peers: Vec<String> = MessageRepository::list_conversations(&pool, &alice)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.username)
            .collect();
        peers.sort();
        assert_eq!(peers, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn mark_conversation_read_touches_only_that_peer() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;

        MessageRepository::create(&pool, &bob, &alice, "one").await.unwrap();
        MessageRepository::create(&pool, &bob, &alice, "two").await.unwrap();
        MessageRepository::create(&pool, &carol, &alice, "three").await.unwrap();

        let updated = MessageRepository::mark_conversation_read(&pool, &alice, &bob)
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(MessageRepository::count_unread(&pool, &alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn either_participant_can_delete() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;

        let msg = MessageRepository::create(&pool, &alice, &bob, "hi").await.unwrap();
        assert!(!MessageRepository::delete(&pool, &msg.id, &carol).await.unwrap());
        assert!(MessageRepository::delete(&pool, &msg.id, &bob).await.unwrap());

        let history = MessageRepository::list_between(&pool, &alice, &bob).await.unwrap();
        assert!(history.is_empty());
    }
}
