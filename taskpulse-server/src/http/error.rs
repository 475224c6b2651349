//! Mapping from core errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::metrics::SamplingError;
use crate::service::TaskError;

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A task operation was rejected.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// An on-demand metrics sample failed.
    #[error("metrics unavailable: {0}")]
    Metrics(String),
}

impl From<SamplingError> for ApiError {
    fn from(e: SamplingError) -> Self {
        Self::Metrics(e.to_string())
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Task(TaskError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Task(TaskError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Metrics(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Task(TaskError::Validation(_)) => "VALIDATION_ERROR",
            Self::Task(TaskError::NotFound(_)) => "TASK_NOT_FOUND",
            Self::Metrics(_) => "METRICS_UNAVAILABLE",
        }
    }

    const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Task(TaskError::Validation(v)) => Some(v.field()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
            field: self.field(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
