use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{ItemKind, SharedItem, ShareWithRecipient};
use crate::error::{AppError, AppResult};

// ============================================================================
// Shared Item Repository
// ============================================================================

const SHARE_COLUMNS: &str =
    "id, item_type, item_id, shared_by, shared_with, confirmed, declined, created_at";

pub struct SharedItemRepository;

impl SharedItemRepository {
    /// Insert a share record. The UNIQUE (item_type, item_id, shared_with)
    /// constraint makes concurrent duplicate inserts impossible; the mapping
    /// in `AppError::from_share_write` turns that violation into a Conflict
    /// and a missing recipient (FK violation) into ReferenceNotFound.
    pub async fn create(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
        shared_by: &str,
        shared_with: &str,
    ) -> AppResult<SharedItem> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SharedItem>(&format!(
            r#"
            INSERT INTO shared_items (id, item_type, item_id, shared_by, shared_with, confirmed, declined, created_at)
            VALUES (?, ?, ?, ?, ?, NULL, NULL, ?)
            RETURNING {SHARE_COLUMNS}
            "#,
        ))
        .bind(&id)
        .bind(item_type)
        .bind(item_id)
        .bind(shared_by)
        .bind(shared_with)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::from_share_write)
    }

    pub async fn find_by_item_and_recipient(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
        recipient_id: &str,
    ) -> AppResult<Option<SharedItem>> {
        sqlx::query_as::<_, SharedItem>(&format!(
            "SELECT {SHARE_COLUMNS} FROM shared_items WHERE item_type = ? AND item_id = ? AND shared_with = ? LIMIT 1"
        ))
        .bind(item_type)
        .bind(item_id)
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// All share records for an item, joined with each recipient's username.
    pub async fn list_for_item(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
    ) -> AppResult<Vec<ShareWithRecipient>> {
        sqlx::query_as::<_, ShareWithRecipient>(
            r#"
            SELECT si.shared_with, u.username AS recipient_username, si.confirmed, si.declined
            FROM shared_items si
            JOIN users u ON si.shared_with = u.id
            WHERE si.item_type = ? AND si.item_id = ?
            ORDER BY si.created_at ASC
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Overwrite the response flags on the unique (item, recipient) record.
    /// Returns false when no such record exists.
    pub async fn set_response(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
        recipient_id: &str,
        confirmed: Option<bool>,
        declined: Option<bool>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE shared_items SET confirmed = ?, declined = ? WHERE item_type = ? AND item_id = ? AND shared_with = ?",
        )
        .bind(confirmed)
        .bind(declined)
        .bind(item_type)
        .bind(item_id)
        .bind(recipient_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove all share records for an item; called when the item itself is
    /// deleted so recipients lose any residual rows.
    pub async fn delete_for_item(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM shared_items WHERE item_type = ? AND item_id = ?")
            .bind(item_type)
            .bind(item_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Owner lookup for an item of either kind. None when the item is absent.
    pub async fn owner_of(
        pool: &SqlitePool,
        item_type: ItemKind,
        item_id: &str,
    ) -> AppResult<Option<String>> {
        let sql = match item_type {
            ItemKind::Task => "SELECT user_id FROM tasks WHERE id = ?",
            ItemKind::Appointment => "SELECT user_id FROM appointments WHERE id = ?",
        };

        let row: Option<(String,)> = sqlx::query_as(sql)
            .bind(item_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.map(|(user_id,)| user_id))
    }
}
