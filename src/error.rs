// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (e.g., missing report capability)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 503 Service Unavailable (attempt store could not be queried)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Attempt store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Scoreboard data is temporarily unavailable".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::ServiceUnavailable`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<ScoreboardError> for AppError {
    fn from(err: ScoreboardError) -> Self {
        match err {
            ScoreboardError::QuizNotFound(id) => AppError::NotFound(format!("Quiz {} not found", id)),
            ScoreboardError::StoreUnavailable(msg) => AppError::ServiceUnavailable(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

/// Failures raised while building a scoreboard.
///
/// Only `StoreUnavailable` and `QuizNotFound` abort a request. The other
/// variants are logged by the aggregator and the offending record is skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreboardError {
    /// The question has no automatic grading. Never surfaced to callers.
    UngradableQuestion(i64),

    /// A question attempt points at a slot missing from the quiz's slot map.
    MissingSlotMapping { question_attempt_id: i64, slot: i32 },

    /// Submitted response parts could not be interpreted.
    MalformedResponse(String),

    /// The attempt store failed to answer a query.
    StoreUnavailable(String),

    QuizNotFound(i64),
}

impl fmt::Display for ScoreboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreboardError::UngradableQuestion(id) => {
                write!(f, "question {} cannot be graded automatically", id)
            }
            ScoreboardError::MissingSlotMapping {
                question_attempt_id,
                slot,
            } => write!(
                f,
                "question attempt {} references unknown slot {}",
                question_attempt_id, slot
            ),
            ScoreboardError::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
            ScoreboardError::StoreUnavailable(msg) => write!(f, "attempt store unavailable: {}", msg),
            ScoreboardError::QuizNotFound(id) => write!(f, "quiz {} not found", id),
        }
    }
}

impl std::error::Error for ScoreboardError {}

impl From<sqlx::Error> for ScoreboardError {
    fn from(err: sqlx::Error) -> Self {
        ScoreboardError::StoreUnavailable(err.to_string())
    }
}
