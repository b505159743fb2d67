use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::{Appointment, AppointmentRepository, SharedItemRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::sharing::{ShareResponse, SharedBy, SharingInfo};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/date/:date", get(list_appointments_on_date))
        .route("/shared/with-me", get(list_shared_with_me))
        .route("/shared/by-me", get(list_shared_by_me))
        .route("/shared/:id/confirm", patch(confirm_share))
        .route("/shared/:id/decline", patch(decline_share))
        .route(
            "/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route("/:id/share", post(share_appointment))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub location: Option<String>,
}

impl AppointmentRequest {
    fn validate(&self) -> AppResult<&str> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if self.end_time < self.start_time {
            return Err(AppError::Validation(
                "End time must not be before start time".to_string(),
            ));
        }
        Ok(title)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub shared_with: Option<String>,
}

impl ShareRequest {
    fn recipient(&self) -> AppResult<&str> {
        match self.shared_with.as_deref().map(str::trim) {
            Some(r) if !r.is_empty() => Ok(r),
            _ => Err(AppError::BadRequest("sharedWith is required".to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(rename = "sharingInfo")]
    pub sharing_info: SharingInfo,
}

/// A shared appointment with the counterpart's username and the share's
/// response flags. Used for both shared/with-me and shared/by-me.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_username: Option<String>,
    pub confirmed: Option<bool>,
    pub declined: Option<bool>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_appointments(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Appointment>>> {
    let appointments = AppointmentRepository::list_for_owner(&state.db, &user.id).await?;
    Ok(Json(appointments))
}

/// Appointments starting on one calendar day. The path segment must be a
/// valid YYYY-MM-DD date.
async fn list_appointments_on_date(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(date): Path<String>,
) -> AppResult<Json<Vec<Appointment>>> {
    let parsed = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Date must be in YYYY-MM-DD format".to_string()))?;

    let appointments = AppointmentRepository::list_for_owner_on_date(
        &state.db,
        &user.id,
        &parsed.format("%Y-%m-%d").to_string(),
    )
    .await?;
    Ok(Json(appointments))
}

async fn create_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<AppointmentRequest>,
) -> AppResult<impl IntoResponse> {
    let title = request.validate()?;

    let appointment = AppointmentRepository::create(
        &state.db,
        &user.id,
        title,
        request.description.as_deref(),
        request.start_time,
        request.end_time,
        request.location.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn get_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<AppointmentDetail>> {
    let (appointment, owner_username) = AppointmentRepository::find_with_owner(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    let decision = state
        .sharing
        .can_view(crate::db::ItemKind::Appointment, &id, &user.id)
        .await?;
    if !decision.allowed {
        return Err(AppError::Forbidden);
    }

    let owner = SharedBy {
        id: appointment.user_id.clone(),
        username: owner_username,
    };
    let sharing_info = state
        .sharing
        .sharing_info(crate::db::ItemKind::Appointment, &id, owner, &user.id)
        .await?;

    Ok(Json(AppointmentDetail {
        appointment,
        sharing_info,
    }))
}

async fn update_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<AppointmentRequest>,
) -> AppResult<Json<Appointment>> {
    let title = request.validate()?;

    let updated = AppointmentRepository::update(
        &state.db,
        &id,
        &user.id,
        title,
        request.description.as_deref(),
        request.start_time,
        request.end_time,
        request.location.as_deref(),
    )
    .await?;
    if !updated {
        return Err(AppError::NotFound("Appointment not found".to_string()));
    }

    let appointment = AppointmentRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    Ok(Json(appointment))
}

/// Delete an appointment, then its share records. See the task counterpart
/// for why the two deletes run unwrapped.
async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = AppointmentRepository::delete(&state.db, &id, &user.id).await?;
    if !deleted {
        return Err(AppError::NotFound("Appointment not found".to_string()));
    }

    SharedItemRepository::delete_for_item(&state.db, crate::db::ItemKind::Appointment, &id).await?;

    Ok(Json(serde_json::json!({ "message": "Appointment deleted" })))
}

async fn share_appointment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> AppResult<impl IntoResponse> {
    let recipient = request.recipient()?;
    let share_id = state
        .sharing
        .create_share(crate::db::ItemKind::Appointment, &id, &user.id, recipient)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Appointment shared", "shareId": share_id })),
    ))
}

async fn list_shared_with_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SharedAppointment>>> {
    let rows = AppointmentRepository::list_shared_with(&state.db, &user.id).await?;
    let res = rows
        .into_iter()
        .map(|r| SharedAppointment {
            appointment: r.appointment,
            shared_by_username: Some(r.counterpart_username),
            shared_with_username: None,
            confirmed: r.confirmed,
            declined: r.declined,
        })
        .collect();
    Ok(Json(res))
}

async fn list_shared_by_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SharedAppointment>>> {
    let rows = AppointmentRepository::list_shared_by(&state.db, &user.id).await?;
    let res = rows
        .into_iter()
        .map(|r| SharedAppointment {
            appointment: r.appointment,
            shared_by_username: None,
            shared_with_username: Some(r.counterpart_username),
            confirmed: r.confirmed,
            declined: r.declined,
        })
        .collect();
    Ok(Json(res))
}

/// Confirm an invitation. Overwrites any earlier answer; responding to an
/// appointment never shared with the caller is NotFound.
async fn confirm_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .sharing
        .respond_to_share(&id, &user.id, ShareResponse::Confirmed)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Appointment confirmed" })))
}

async fn decline_share(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state
        .sharing
        .respond_to_share(&id, &user.id, ShareResponse::Declined)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Appointment declined" })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::db::{AppointmentRepository, ItemKind};
    use crate::routes::testing::{bearer, body_json, test_app};
    use crate::services::init::test_support::seed_user;

    fn get(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(http::header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    fn patch(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(uri)
            .header(http::header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    fn json(method: &str, uri: &str, auth: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::AUTHORIZATION, auth)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn seed_appointment(state: &crate::AppState, owner: &str) -> String {
        let start = chrono::Utc::now().naive_utc();
        let end = start + chrono::Duration::hours(1);
        AppointmentRepository::create(&state.db, owner, "Standup", None, start, end, None)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;

        let response = app
            .oneshot(json(
                "POST",
                "/api/appointments",
                &bearer(&state, &alice),
                serde_json::json!({
                    "title": "Backwards",
                    "startTime": "2026-09-01T10:00:00",
                    "endTime": "2026-09-01T09:00:00"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn date_listing_validates_format_and_filters() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let auth = bearer(&state, &alice);

        let start = chrono::NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        AppointmentRepository::create(
            &state.db,
            &alice,
            "On the day",
            None,
            start,
            start + chrono::Duration::hours(1),
            None,
        )
        .await
        .unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/appointments/date/not-a-date", &auth))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(get("/api/appointments/date/2026-09-01", &auth))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let response = app
            .oneshot(get("/api/appointments/date/2026-09-02", &auth))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn confirm_then_decline_via_http() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let appt = seed_appointment(&state, &alice).await;
        state
            .sharing
            .create_share(ItemKind::Appointment, &appt, &alice, &bob)
            .await
            .unwrap();

        let bob_auth = bearer(&state, &bob);
        let response = app
            .clone()
            .oneshot(patch(
                &format!("/api/appointments/shared/{appt}/confirm"),
                &bob_auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(patch(
                &format!("/api/appointments/shared/{appt}/decline"),
                &bob_auth,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // owner sees bob's final answer in the projection
        let response = app
            .oneshot(get(&format!("/api/appointments/{appt}"), &bearer(&state, &alice)))
            .await
            .unwrap();
        let body = body_json(response).await;
        let recipient = &body["sharingInfo"]["recipients"][0];
        assert_eq!(recipient["confirmed"], false);
        assert_eq!(recipient["declined"], true);
    }

    #[tokio::test]
    async fn responding_without_a_share_is_not_found() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let appt = seed_appointment(&state, &alice).await;

        let response = app
            .oneshot(patch(
                &format!("/api/appointments/shared/{appt}/confirm"),
                &bearer(&state, &bob),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_share_is_conflict_over_http() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let appt = seed_appointment(&state, &alice).await;

        let auth = bearer(&state, &alice);
        let share_body = serde_json::json!({ "sharedWith": bob });
        let response = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("/api/appointments/{appt}/share"),
                &auth,
                share_body.clone(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("/api/appointments/{appt}/share"),
                &auth,
                share_body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CONFLICT");

        // The rejected duplicate must leave the recipient list at one entry.
        let response = app
            .oneshot(get(&format!("/api/appointments/{appt}"), &auth))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["sharingInfo"]["recipients"].as_array().unwrap().len(), 1);
    }
}
