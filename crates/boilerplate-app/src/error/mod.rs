//! App-facing error surface. Wraps `CoreError` and decides how each variant
//! is answered over HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use boilerplate_core::CoreError;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] CoreError);

impl AppError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self(CoreError::Configuration(message.into()))
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self(CoreError::Persistence(message.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self(CoreError::Validation(message.into()))
    }

    pub fn as_core(&self) -> &CoreError {
        &self.0
    }

    pub fn into_core(self) -> CoreError {
        self.0
    }

    pub fn status(&self) -> StatusCode {
        match self.as_core() {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::DependencyUnavailable(_)
            | CoreError::Configuration(_)
            | CoreError::Persistence(_)
            | CoreError::UnsupportedSchemaVersion { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for CoreError {
    fn from(value: AppError) -> Self {
        value.0
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::persistence(format!("storage task failed: {value}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0 {
            CoreError::Validation(message) | CoreError::Conflict(message) => {
                (status, message).into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                (status, "Internal server error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        assert_eq!(
            AppError::validation("Username and email are required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CoreError::Conflict("Email already exists".to_owned())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn storage_failures_are_internal() {
        let error = AppError::persistence("disk I/O error");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "persistence error: disk I/O error");
        assert_eq!(
            error.into_core(),
            CoreError::Persistence("disk I/O error".to_owned())
        );
    }
}
