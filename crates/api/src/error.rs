//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{Aggregate, CommandOutcome, CommandResult, DomainError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The broker did not accept a command.
    Command {
        outcome: CommandOutcome,
        errors: Vec<String>,
    },
    NotFound(String),
    BadRequest(String),
    /// Failure while reading aggregates.
    Domain(DomainError),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Command { outcome, .. } => outcome_status(*outcome),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Domain(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// HTTP status for a command outcome.
pub fn outcome_status(outcome: CommandOutcome) -> StatusCode {
    match outcome {
        CommandOutcome::Accepted => StatusCode::OK,
        CommandOutcome::Invalid => StatusCode::BAD_REQUEST,
        CommandOutcome::NotFound => StatusCode::NOT_FOUND,
        CommandOutcome::Conflict => StatusCode::CONFLICT,
        CommandOutcome::NotHandled => StatusCode::INTERNAL_SERVER_ERROR,
        CommandOutcome::Unavailable | CommandOutcome::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// The resulting entity of an accepted command, or the error to respond
/// with.
pub fn accepted<A: Aggregate>(result: CommandResult<A>) -> Result<A, ApiError> {
    if !result.is_accepted() {
        return Err(ApiError::Command {
            outcome: result.outcome,
            errors: result.errors,
        });
    }
    result
        .into_entity()
        .ok_or_else(|| ApiError::Internal("accepted command returned no entity".to_string()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Command { outcome, errors } => serde_json::json!({
                "error": errors.join("; "),
                "outcome": outcome.as_str(),
                "errors": errors,
            }),
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => {
                serde_json::json!({ "error": msg })
            }
            ApiError::Domain(err) => {
                tracing::error!(error = %err, "failed to read aggregate");
                serde_json::json!({ "error": err.to_string() })
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                serde_json::json!({ "error": msg })
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}
