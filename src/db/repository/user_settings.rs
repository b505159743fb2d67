use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::UserSettings;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Settings Repository
// ============================================================================

pub struct UserSettingsRepository;

impl UserSettingsRepository {
    pub async fn find_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<UserSettings>> {
        sqlx::query_as::<_, UserSettings>(
            r#"
            SELECT user_id, theme, primary_color, secondary_color, notifications_enabled, updated_at
            FROM user_settings
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn set_primary_color(
        pool: &SqlitePool,
        user_id: &str,
        color: &str,
    ) -> AppResult<()> {
        Self::upsert_column(pool, user_id, "primary_color", color).await
    }

    pub async fn set_secondary_color(
        pool: &SqlitePool,
        user_id: &str,
        color: &str,
    ) -> AppResult<()> {
        Self::upsert_column(pool, user_id, "secondary_color", color).await
    }

    pub async fn set_notifications_enabled(
        pool: &SqlitePool,
        user_id: &str,
        enabled: bool,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, notifications_enabled, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET notifications_enabled = excluded.notifications_enabled, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(enabled)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::from_user_write)?;

        Ok(())
    }

    // Column name comes from a fixed set above, never from user input.
    async fn upsert_column(
        pool: &SqlitePool,
        user_id: &str,
        column: &str,
        value: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let sql = format!(
            r#"
            INSERT INTO user_settings (user_id, {column}, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET {column} = excluded.{column}, updated_at = excluded.updated_at
            "#,
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(value)
            .bind(now)
            .execute(pool)
            .await
            .map_err(AppError::from_user_write)?;

        Ok(())
    }
}
