//! Error types for autoreduce-api
//!
//! Maps the three request outcomes that are not a success onto HTTP:
//! - [`ValidationError`] → 400 `{"error": ...}`
//! - service rejection → 400 `{"message": ...}`
//! - anything unexpected → 500, cause logged but not returned

use autoreduce_common::api::types::{ErrorResponse, MessageResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::selection::MAX_RUNS_PER_REQUEST;
use crate::service::ServiceError;

/// Malformed or incomplete request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No 'runs' key specified")]
    MissingRuns,

    #[error("'runs' must be a list of run numbers")]
    RunsNotAList,

    #[error("Element {index} of 'runs' is not an integer")]
    NotAnInteger { index: usize },

    #[error("Run number {value} is not a positive integer")]
    NotPositive { value: String },

    #[error("End run {end} is before start run {start}")]
    EndBeforeStart { start: i64, end: i64 },

    #[error("Too many runs requested: {count} (maximum {})", MAX_RUNS_PER_REQUEST)]
    TooManyRuns { count: u64 },

    #[error("'{field}' must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request shape (400, `error` body)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Submission service refused the operation (400, `message` body)
    #[error("{0}")]
    Domain(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(message) => ApiError::Domain(message),
            ServiceError::Internal(message) => ApiError::Internal(message),
        }
    }
}

impl From<autoreduce_common::Error> for ApiError {
    fn from(err: autoreduce_common::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(err.to_string()))).into_response()
            }
            ApiError::Domain(message) => {
                (StatusCode::BAD_REQUEST, Json(MessageResponse::new(message))).into_response()
            }
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "Request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ApiError::from(ValidationError::MissingRuns).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(ServiceError::Domain("nope".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::from(ServiceError::Internal("disk".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::MissingRuns.to_string(), "No 'runs' key specified");
        assert_eq!(
            ValidationError::EndBeforeStart { start: 10, end: 5 }.to_string(),
            "End run 5 is before start run 10"
        );
        assert_eq!(
            ValidationError::TooManyRuns { count: 20_000 }.to_string(),
            format!("Too many runs requested: 20000 (maximum {})", MAX_RUNS_PER_REQUEST)
        );
    }
}
