//! HTTP surface. Every `/api` route also answers on a `.json` alias.

mod dto;
mod health;
mod users;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use boilerplate_core::SqliteDatabase;

pub use dto::{CountResponse, CreateUserRequest, HealthResponse, HelloResponse, UserDto};
pub use health::{database_info, is_healthy};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct AppState {
    database: Arc<SqliteDatabase>,
}

impl AppState {
    pub fn new(database: Arc<SqliteDatabase>) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Arc<SqliteDatabase> {
        &self.database
    }

    /// Runs a blocking storage call off the async runtime.
    pub(crate) async fn with_database<T, F>(&self, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteDatabase) -> Result<T, boilerplate_core::CoreError> + Send + 'static,
    {
        let database = Arc::clone(&self.database);
        tokio::task::spawn_blocking(move || operation(&database))
            .await?
            .map_err(AppError::from)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::liveness))
        .route("/api/hello", get(health::hello))
        .route("/api/hello.json", get(health::hello_json))
        .route("/api/health", get(health::health))
        .route("/api/health.json", get(health::health))
        .route(
            "/api/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/users.json",
            get(users::list_users).post(users::create_user),
        )
        .route("/api/users/count", get(users::count_users))
        .route("/api/users/count.json", get(users::count_users))
        .route("/api/users/{id}", get(users::get_user))
        .with_state(state)
}
