use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::app::interactions::InteractionError;
use crate::domain::interaction::ErrorCode;

/// Failure response in the shared `{ ok, message }` envelope.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    ok: bool,
    message: String,
    code: ErrorCode,
}

impl AppError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, message)
    }

    pub fn post_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorCode::PostNotFound, "post not found")
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl From<InteractionError> for AppError {
    fn from(err: InteractionError) -> Self {
        match err {
            InteractionError::PostNotFound => Self::post_not_found(),
            InteractionError::DuplicateReaction | InteractionError::ReactionNotFound => {
                Self::conflict(err.code(), err.to_string())
            }
            InteractionError::Storage(ref source) => {
                tracing::error!(error = ?source, "failed to apply interaction");
                Self::internal("failed to apply interaction")
            }
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorEnvelope {
            ok: false,
            message: self.message,
            code: self.code,
        });
        (self.status, body).into_response()
    }
}
