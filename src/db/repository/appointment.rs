use chrono::{NaiveDateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::Appointment;
use crate::error::{AppError, AppResult};

// ============================================================================
// Appointment Repository
// ============================================================================

const APPOINTMENT_COLUMNS: &str =
    "id, user_id, title, description, start_time, end_time, location, created_at, updated_at";

/// An appointment row joined with the counterpart's username and the share's
/// response flags, as returned by the shared/with-me and shared/by-me lists.
#[derive(Debug, Clone)]
pub struct SharedAppointmentRow {
    pub appointment: Appointment,
    pub counterpart_username: String,
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
}

pub struct AppointmentRepository;

impl AppointmentRepository {
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &SqlitePool,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        location: Option<&str>,
    ) -> AppResult<Appointment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Appointment>(&format!(
            r#"
            INSERT INTO appointments
                (id, user_id, title, description, start_time, end_time, location, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {APPOINTMENT_COLUMNS}
            "#,
        ))
        .bind(&id)
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(start_time)
        .bind(end_time)
        .bind(location)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Appointment>> {
        sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Fetch an appointment together with its owner's username. Returns None
    /// when the appointment does not exist.
    pub async fn find_with_owner(
        pool: &SqlitePool,
        id: &str,
    ) -> AppResult<Option<(Appointment, String)>> {
        let row = sqlx::query(
            r#"
            SELECT a.id, a.user_id, a.title, a.description, a.start_time, a.end_time,
                   a.location, a.created_at, a.updated_at, u.username AS owner_username
            FROM appointments a
            JOIN users u ON a.user_id = u.id
            WHERE a.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        row.map(|r| {
            let appointment = Self::row_to_appointment(&r)?;
            let owner_username: String = r.try_get("owner_username")?;
            Ok((appointment, owner_username))
        })
        .transpose()
        .map_err(AppError::Database)
    }

    pub async fn list_for_owner(
        pool: &SqlitePool,
        owner_id: &str,
    ) -> AppResult<Vec<Appointment>> {
        sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE user_id = ? ORDER BY start_time DESC"
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Appointments for `owner_id` starting on the given calendar day
    /// (`date` in YYYY-MM-DD form, validated at the handler boundary).
    pub async fn list_for_owner_on_date(
        pool: &SqlitePool,
        owner_id: &str,
        date: &str,
    ) -> AppResult<Vec<Appointment>> {
        sqlx::query_as::<_, Appointment>(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE DATE(start_time) = ? AND user_id = ? ORDER BY start_time ASC"
        ))
        .bind(date)
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        location: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET title = ?, description = ?, start_time = ?, end_time = ?, location = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(start_time)
        .bind(end_time)
        .bind(location)
        .bind(now)
        .bind(id)
        .bind(owner_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &SqlitePool, id: &str, owner_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Appointments shared with `recipient_id`, with the sharer's username and
    /// the recipient's own response flags.
    pub async fn list_shared_with(
        pool: &SqlitePool,
        recipient_id: &str,
    ) -> AppResult<Vec<SharedAppointmentRow>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.user_id, a.title, a.description, a.start_time, a.end_time,
                   a.location, a.created_at, a.updated_at,
                   u_sharer.username AS counterpart_username, si.confirmed, si.declined
            FROM appointments a
            JOIN shared_items si ON a.id = si.item_id AND si.item_type = 'appointment'
            JOIN users u_sharer ON si.shared_by = u_sharer.id
            WHERE si.shared_with = ?
            ORDER BY a.start_time DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(Self::row_to_shared).collect()
    }

    /// Appointments `owner_id` has shared, one row per recipient, with that
    /// recipient's username and response flags.
    pub async fn list_shared_by(
        pool: &SqlitePool,
        owner_id: &str,
    ) -> AppResult<Vec<SharedAppointmentRow>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.user_id, a.title, a.description, a.start_time, a.end_time,
                   a.location, a.created_at, a.updated_at,
                   u_receiver.username AS counterpart_username, si.confirmed, si.declined
            FROM appointments a
            JOIN shared_items si ON a.id = si.item_id AND si.item_type = 'appointment'
            JOIN users u_receiver ON si.shared_with = u_receiver.id
            WHERE si.shared_by = ?
            ORDER BY a.start_time DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.iter().map(Self::row_to_shared).collect()
    }

    fn row_to_appointment(r: &sqlx::sqlite::SqliteRow) -> Result<Appointment, sqlx::Error> {
        Ok(Appointment {
            id: r.try_get("id")?,
            user_id: r.try_get("user_id")?,
            title: r.try_get("title")?,
            description: r.try_get("description")?,
            start_time: r.try_get("start_time")?,
            end_time: r.try_get("end_time")?,
            location: r.try_get("location")?,
            created_at: r.try_get("created_at")?,
            updated_at: r.try_get("updated_at")?,
        })
    }

    fn row_to_shared(r: &sqlx::sqlite::SqliteRow) -> AppResult<SharedAppointmentRow> {
        let appointment = Self::row_to_appointment(r).map_err(AppError::Database)?;
        Ok(SharedAppointmentRow {
            appointment,
            counterpart_username: r
                .try_get("counterpart_username")
                .map_err(AppError::Database)?,
            confirmed: r.try_get("confirmed").map_err(AppError::Database)?,
            declined: r.try_get("declined").map_err(AppError::Database)?,
        })
    }
}
