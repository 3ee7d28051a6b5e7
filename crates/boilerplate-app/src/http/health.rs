use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use boilerplate_core::StorageBackend;

use super::dto::{HealthResponse, HelloResponse};
use super::AppState;

const HELLO_MESSAGE: &str = "Hello, World!";
const DATABASE_INFO_UNAVAILABLE: &str = "Database info unavailable";

/// Connectivity probe under the configured probe timeout.
pub async fn is_healthy(state: &AppState) -> bool {
    match state.with_database(|database| database.probe()).await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(error = %error, "database health check failed");
            false
        }
    }
}

pub async fn database_info(state: &AppState) -> String {
    match state
        .with_database(|database| database.database_info())
        .await
    {
        Ok(info) => info.describe(),
        Err(error) => {
            tracing::error!(error = %error, "failed to read database info");
            DATABASE_INFO_UNAVAILABLE.to_owned()
        }
    }
}

pub(super) async fn hello() -> &'static str {
    HELLO_MESSAGE
}

pub(super) async fn hello_json(State(state): State<AppState>) -> Json<HelloResponse> {
    Json(HelloResponse::new(HELLO_MESSAGE, is_healthy(&state).await))
}

pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let healthy = is_healthy(&state).await;
    let info = if healthy {
        Some(database_info(&state).await)
    } else {
        None
    };
    Json(HealthResponse::new(healthy, info))
}

pub(super) async fn liveness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if is_healthy(&state).await {
        (StatusCode::OK, "Healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy")
    }
}
