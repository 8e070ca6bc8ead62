use crate::error::{AuthError, TaskError};
use crate::task::TaskStatus;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response of the HTTP API: `{"error": "..."}`, plus the task
/// status when a result is asked for too early.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub task_status: Option<TaskStatus>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            task_status: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.task_status {
            Some(status) => json!({ "error": self.message, "status": status }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Validation(_) | TaskError::InvalidTransition { .. } => {
                Self::bad_request(err.to_string())
            }
            TaskError::QueueFull | TaskError::ShuttingDown => Self::unavailable(err.to_string()),
            TaskError::NotFound(_) => Self::not_found("task not found"),
            TaskError::NotReady { status } => Self {
                status: StatusCode::BAD_REQUEST,
                message: "task not completed".to_string(),
                task_status: Some(status),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => Self::bad_request(err.to_string()),
            AuthError::Signing(ref source) => {
                error!(error = %source, "failed to sign token");
                Self::internal("failed to generate token")
            }
            _ => Self::unauthorized(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid request body: {}", rejection.body_text()))
    }
}
