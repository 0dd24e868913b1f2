//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use syllatrack_shared::SyllatrackError;

/// Errors a handler can return.
///
/// The body is always `{"error": "<short message>"}`. Internal failures log the
/// full error and send only the per-operation message.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed request input.
    BadRequest(String),
    /// The addressed record does not exist.
    NotFound(String),
    /// Anything else; `message` names the failed operation.
    Internal {
        message: &'static str,
        source: SyllatrackError,
    },
}

impl ApiError {
    /// Map a service error, using `message` when it is not the caller's fault.
    pub fn from_service(message: &'static str) -> impl FnOnce(SyllatrackError) -> Self {
        move |source| match source.validation_message() {
            Some(msg) => Self::BadRequest(msg.to_string()),
            None => Self::Internal { message, source },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal { message, source } => {
                tracing::error!(error = %source, "{message}");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
