use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{SharedItemRepository, Task, TaskRepository, TaskStatus};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::sharing::{SharedBy, SharingInfo};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/shared/with-me", get(list_shared_with_me))
        .route("/shared/by-me", get(list_shared_by_me))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
        .route("/:id/complete", patch(complete_task))
        .route("/:id/share", post(share_task))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDateTime>,
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

/// A task plus its sharing projection, returned by the detail endpoint.
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    #[serde(rename = "sharingInfo")]
    pub sharing_info: SharingInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedWithMeTask {
    #[serde(flatten)]
    pub task: Task,
    pub shared_by_username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedByMeTask {
    #[serde(flatten)]
    pub task: Task,
    pub shared_with_username: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = TaskRepository::list_for_owner(&state.db, &user.id).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<TaskRequest>,
) -> AppResult<impl IntoResponse> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let task = TaskRepository::create(
        &state.db,
        &user.id,
        title,
        request.description.as_deref(),
        request.due_date,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Fetch one task with its sharing projection. Owners and share recipients
/// may read; anyone else is denied without learning more than "it exists".
async fn get_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<TaskDetail>> {
    let (task, owner_username) = TaskRepository::find_with_owner(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

    let decision = state
        .sharing
        .can_view(crate::db::ItemKind::Task, &id, &user.id)
        .await?;
    if !decision.allowed {
        return Err(AppError::Forbidden);
    }

    let owner = SharedBy {
        id: task.user_id.clone(),
        username: owner_username,
    };
    let sharing_info = state
        .sharing
        .sharing_info(crate::db::ItemKind::Task, &id, owner, &user.id)
        .await?;

    Ok(Json(TaskDetail { task, sharing_info }))
}

/// Update a task. The owner-scoped UPDATE affects zero rows for non-owners
/// and missing tasks alike; both surface as NotFound.
async fn update_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<TaskRequest>,
) -> AppResult<Json<Task>> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let updated = TaskRepository::update(
        &state.db,
        &id,
        &user.id,
        title,
        request.description.as_deref(),
        request.due_date,
    )
    .await?;
    if !updated {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    let task = TaskRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

async fn complete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let updated =
        TaskRepository::set_status(&state.db, &id, &user.id, TaskStatus::Completed).await?;
    if !updated {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "message": "Task marked as completed" })))
}

/// Delete a task, then clear its share records so recipients lose access.
/// No transaction: a failure between the two deletes leaves orphaned share
/// rows that grant nothing, since visibility checks start from the item.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = TaskRepository::delete(&state.db, &id, &user.id).await?;
    if !deleted {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    SharedItemRepository::delete_for_item(&state.db, crate::db::ItemKind::Task, &id).await?;

    Ok(Json(serde_json::json!({ "message": "Task deleted" })))
}

async fn share_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> AppResult<impl IntoResponse> {
    let recipient = request.recipient()?;
    let share_id = state
        .sharing
        .create_share(crate::db::ItemKind::Task, &id, &user.id, recipient)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "Task shared", "shareId": share_id })),
    ))
}

async fn list_shared_with_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SharedWithMeTask>>> {
    let rows = TaskRepository::list_shared_with(&state.db, &user.id).await?;
    let res = rows
        .into_iter()
        .map(|(task, shared_by_username)| SharedWithMeTask {
            task,
            shared_by_username,
        })
        .collect();
    Ok(Json(res))
}

async fn list_shared_by_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SharedByMeTask>>> {
    let rows = TaskRepository::list_shared_by(&state.db, &user.id).await?;
    let res = rows
        .into_iter()
        .map(|(task, shared_with_username)| SharedByMeTask {
            task,
            shared_with_username,
        })
        .collect();
    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::db::TaskRepository;
    use crate::routes::testing::{bearer, body_json, test_app};
    use crate::services::init::test_support::seed_user;

    fn get(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
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

    #[tokio::test]
    async fn task_detail_carries_sharing_info() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let task = TaskRepository::create(&state.db, &alice, "Water plants", None, None)
            .await
            .unwrap();

        let alice_auth = bearer(&state, &alice);
        let response = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("/api/tasks/{}/share", task.id),
                &alice_auth,
                serde_json::json!({ "sharedWith": bob }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // owner view: recipients listed, no myShareInfo
        let response = app
            .clone()
            .oneshot(get(&format!("/api/tasks/{}", task.id), &alice_auth))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["title"], "Water plants");
        assert_eq!(body["sharingInfo"]["isShared"], true);
        assert_eq!(body["sharingInfo"]["recipients"][0]["username"], "bob");
        assert!(body["sharingInfo"]["myShareInfo"].is_null());

        // recipient view: myShareInfo present (pending, so null flags)
        let response = app
            .oneshot(get(&format!("/api/tasks/{}", task.id), &bearer(&state, &bob)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["sharingInfo"]["myShareInfo"].is_object());
        assert!(body["sharingInfo"]["myShareInfo"]["confirmed"].is_null());
    }

    #[tokio::test]
    async fn unrelated_user_gets_forbidden_missing_gets_not_found() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let mallory = seed_user(&state.db, "mallory").await;
        let task = TaskRepository::create(&state.db, &alice, "Private", None, None)
            .await
            .unwrap();

        let mallory_auth = bearer(&state, &mallory);
        let response = app
            .clone()
            .oneshot(get(&format!("/api/tasks/{}", task.id), &mallory_auth))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(get("/api/tasks/no-such-task", &mallory_auth))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mutating_someone_elses_task_is_not_found() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let task = TaskRepository::create(&state.db, &alice, "Untouchable", None, None)
            .await
            .unwrap();

        let bob_auth = bearer(&state, &bob);
        let response = app
            .clone()
            .oneshot(json(
                "PUT",
                &format!("/api/tasks/{}", task.id),
                &bob_auth,
                serde_json::json!({ "title": "Hijacked" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/tasks/{}", task.id))
                    .header(http::header::AUTHORIZATION, &bob_auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // still intact
        let task = TaskRepository::find_by_id(&state.db, &task.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.title, "Untouchable");
    }

    #[tokio::test]
    async fn complete_endpoint_flips_status() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let task = TaskRepository::create(&state.db, &alice, "Finishable", None, None)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri(format!("/api/tasks/{}/complete", task.id))
                    .header(http::header::AUTHORIZATION, bearer(&state, &alice))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let task = TaskRepository::find_by_id(&state.db, &task.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task.status, crate::db::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn shared_with_me_lists_sharer_username() {
        let (app, state) = test_app().await;
        let alice = seed_user(&state.db, "alice").await;
        let bob = seed_user(&state.db, "bob").await;
        let task = TaskRepository::create(&state.db, &alice, "Team chore", None, None)
            .await
            .unwrap();
        state
            .sharing
            .create_share(crate::db::ItemKind::Task, &task.id, &alice, &bob)
            .await
            .unwrap();

        let response = app
            .oneshot(get("/api/tasks/shared/with-me", &bearer(&state, &bob)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["title"], "Team chore");
        assert_eq!(body[0]["sharedByUsername"], "alice");
    }
}
