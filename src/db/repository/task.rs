use chrono::{NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Task, TaskStatus};
use crate::error::{AppError, AppResult};

// ============================================================================
// Task Repository
// ============================================================================

const TASK_COLUMNS: &str = "id, user_id, title, description, due_date, status, created_at, updated_at";

pub struct TaskRepository;

impl TaskRepository {
    pub async fn create(
        pool: &SqlitePool,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        due_date: Option<NaiveDateTime>,
    ) -> AppResult<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (id, user_id, title, description, due_date, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(&id)
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(due_date)
        .bind(TaskStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Fetch a task together with its owner's username (for the sharing-info
    /// projection). Returns None when the task does not exist.
    pub async fn find_with_owner(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<(Task, String)>> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.user_id, t.title, t.description, t.due_date, t.status,
                   t.created_at, t.updated_at, u.username AS owner_username
            FROM tasks t
            JOIN users u ON t.user_id = u.id
            WHERE t.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| {
            let task = Task {
                id: r.try_get("id")?,
                user_id: r.try_get("user_id")?,
                title: r.try_get("title")?,
                description: r.try_get("description")?,
                due_date: r.try_get("due_date")?,
                status: r.try_get("status")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            };
            let owner_username: String = r.try_get("owner_username")?;
            Ok((task, owner_username))
        })
        .transpose()
        .map_err(AppError::Database)
    }

    pub async fn list_for_owner(pool: &SqlitePool, owner_id: &str) -> AppResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Update mutable fields. The owner predicate in the WHERE clause is the
    /// second line of defence after the handler-level ownership check.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        due_date: Option<NaiveDateTime>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, due_date = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(due_date)
        .bind(now)
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_status(
        pool: &SqlitePool,
        id: &str,
        owner_id: &str,
        status: TaskStatus,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result =
            sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?")
                .bind(status)
                .bind(now)
                .bind(id)
                .bind(owner_id)
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, id: &str, owner_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Tasks shared with `recipient_id`, joined with the sharer's username.
    pub async fn list_shared_with(
        pool: &SqlitePool,
        recipient_id: &str,
    ) -> AppResult<Vec<(Task, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.user_id, t.title, t.description, t.due_date, t.status,
                   t.created_at, t.updated_at, u_sharer.username AS shared_by_username
            FROM tasks t
            JOIN shared_items si ON t.id = si.item_id AND si.item_type = 'task'
            JOIN users u_sharer ON si.shared_by = u_sharer.id
            WHERE si.shared_with = ?
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let task = Task {
                id: r.try_get("id").map_err(AppError::Database)?,
                user_id: r.try_get("user_id").map_err(AppError::Database)?,
                title: r.try_get("title").map_err(AppError::Database)?,
                description: r.try_get("description").map_err(AppError::Database)?,
                due_date: r.try_get("due_date").map_err(AppError::Database)?,
                status: r.try_get("status").map_err(AppError::Database)?,
                created_at: r.try_get("created_at").map_err(AppError::Database)?,
                updated_at: r.try_get("updated_at").map_err(AppError::Database)?,
            };
            let sharer: String = r.try_get("shared_by_username").map_err(AppError::Database)?;
            out.push((task, sharer));
        }

        Ok(out)
    }

    /// Tasks `owner_id` has shared, joined with each recipient's username.
    /// One row per (task, recipient) pair, matching the share records.
    pub async fn list_shared_by(
        pool: &SqlitePool,
        owner_id: &str,
    ) -> AppResult<Vec<(Task, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.user_id, t.title, t.description, t.due_date, t.status,
                   t.created_at, t.updated_at, u_recipient.username AS shared_with_username
            FROM tasks t
            JOIN shared_items si ON t.id = si.item_id AND si.item_type = 'task'
            JOIN users u_recipient ON si.shared_with = u_recipient.id
            WHERE si.shared_by = ?
            ORDER BY t.created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let task = Task {
                id: r.try_get("id").map_err(AppError::Database)?,
                user_id: r.try_get("user_id").map_err(AppError::Database)?,
                title: r.try_get("title").map_err(AppError::Database)?,
                description: r.try_get("description").map_err(AppError::Database)?,
                due_date: r.try_get("due_date").map_err(AppError::Database)?,
                status: r.try_get("status").map_err(AppError::Database)?,
                created_at: r.try_get("created_at").map_err(AppError::Database)?,
                updated_at: r.try_get("updated_at").map_err(AppError::Database)?,
            };
            let recipient: String = r
                .try_get("shared_with_username")
                .map_err(AppError::Database)?;
            out.push((task, recipient));
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::init::test_support::{seed_user, test_pool};

    #[tokio::test]
    async fn update_is_owner_scoped() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let task = TaskRepository::create(&pool, &alice, "Original", None, None)
            .await
            .unwrap();

        // non-owner update hits zero rows
        assert!(
            !TaskRepository::update(&pool, &task.id, &bob, "Hijacked", None, None)
                .await
                .unwrap()
        );
        assert!(
            TaskRepository::update(&pool, &task.id, &alice, "Renamed", None, None)
                .await
                .unwrap()
        );

        let task = TaskRepository::find_by_id(&pool, &task.id).await.unwrap().unwrap();
        assert_eq!(task.title, "Renamed");
    }

    #[tokio::test]
    async fn set_status_marks_complete() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;

        let task = TaskRepository::create(&pool, &alice, "Chore", None, None)
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);

        assert!(
            TaskRepository::set_status(&pool, &task.id, &alice, TaskStatus::Completed)
                .await
                .unwrap()
        );
        let task = TaskRepository::find_by_id(&pool, &task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn shared_listings_join_usernames() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let task = TaskRepository::create(&pool, &alice, "Shared chore", None, None)
            .await
            .unwrap();
        crate::db::SharedItemRepository::create(
            &pool,
            crate::db::ItemKind::Task,
            &task.id,
            &alice,
            &bob,
        )
        .await
        .unwrap();

        let with_bob = TaskRepository::list_shared_with(&pool, &bob).await.unwrap();
        assert_eq!(with_bob.len(), 1);
        assert_eq!(with_bob[0].1, "alice");

        let by_alice = TaskRepository::list_shared_by(&pool, &alice).await.unwrap();
        assert_eq!(by_alice.len(), 1);
        assert_eq!(by_alice[0].1, "bob");

        // shares never leak into the recipient's own task list
        assert!(TaskRepository::list_for_owner(&pool, &bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_clears_task_but_not_other_shares() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let task = TaskRepository::create(&pool, &alice, "Ephemeral", None, None)
            .await
            .unwrap();
        crate::db::SharedItemRepository::create(
            &pool,
            crate::db::ItemKind::Task,
            &task.id,
            &alice,
            &bob,
        )
        .await
        .unwrap();

        assert!(TaskRepository::delete(&pool, &task.id, &alice).await.unwrap());
        let removed = crate::db::SharedItemRepository::delete_for_item(
            &pool,
            crate::db::ItemKind::Task,
            &task.id,
        )
        .await
        .unwrap();
        assert_eq!(removed, 1);

        assert!(TaskRepository::list_shared_with(&pool, &bob).await.unwrap().is_empty());
    }
}
