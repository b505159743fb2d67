pub mod appointments;
pub mod auth;
pub mod health;
pub mod messages;
pub mod settings;
pub mod tasks;
pub mod users;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::{routing::get, Router};

    use crate::config::{Config, JwtConfig};
    use crate::services::auth::AuthService;
    use crate::services::init::test_support::test_pool;
    use crate::services::sharing::SharingEngine;
    use crate::AppState;

    /// Full application router over a fresh in-memory database, without the
    /// rate-limiting and CORS layers that need a real socket.
    pub async fn test_app() -> (Router, Arc<AppState>) {
        let pool = test_pool().await;
        let config = Config {
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                expiration_hours: 24,
            },
            ..Default::default()
        };

        let state = Arc::new(AppState {
            db: pool.clone(),
            config,
            sharing: SharingEngine::new(pool),
        });

        let app = Router::new()
            .route("/health", get(super::health::health_check))
            .nest("/api/auth", super::auth::router())
            .nest("/api/users", super::users::router())
            .nest("/api/tasks", super::tasks::router())
            .nest("/api/appointments", super::appointments::router())
            .nest("/api/messages", super::messages::router())
            .nest("/api/settings", super::settings::router())
            .with_state(state.clone());

        (app, state)
    }

    pub fn bearer(state: &Arc<AppState>, user_id: &str) -> String {
        let token = AuthService::create_jwt(&state.config.jwt, user_id).unwrap();
        format!("Bearer {token}")
    }

    pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
        use http_body_util::BodyExt;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
