use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::from_user_write)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Whether another user (id != `exclude_id`) already holds this username
    /// or email. Used by profile updates to produce a Conflict before hitting
    /// the unique constraint.
    pub async fn identity_taken_by_other(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        exclude_id: &str,
    ) -> AppResult<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM users WHERE (email = ? OR username = ?) AND id != ? LIMIT 1",
        )
        .bind(email)
        .bind(username)
        .bind(exclude_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.is_some())
    }

    /// Search users by username or email (case-insensitive substring match).
    pub async fn search(pool: &SqlitePool, query: &str, limit: i64) -> AppResult<Vec<User>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", query.to_lowercase());

        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at
            FROM users
            WHERE LOWER(username) LIKE ? OR LOWER(email) LIKE ?
            ORDER BY username ASC
            LIMIT ?
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            "UPDATE users SET username = ?, email = ?, updated_at = ? WHERE id = ?",
        )
        .bind(username)
        .bind(email)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::from_user_write)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password_hash(
        pool: &SqlitePool,
        user_id: &str,
        password_hash: &str,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Delete a user. Dependent rows (items, messages, shares, settings) go
    /// with it via ON DELETE CASCADE.
    pub async fn delete(pool: &SqlitePool, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
