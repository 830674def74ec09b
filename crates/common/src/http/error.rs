use crate::domain::DomainError;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Message returned for any payload without a usable identity
pub const BAD_OBJECT_MESSAGE: &str = "bad object";

/// Response body shared by every collector endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

/// 400 response for malformed or identity-less payloads
pub fn bad_object_response() -> (StatusCode, Json<StatusResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(StatusResponse::error(BAD_OBJECT_MESSAGE)),
    )
}

/// Convert domain error to an HTTP status and body
pub fn domain_error_to_response(err: DomainError) -> (StatusCode, Json<StatusResponse>) {
    match &err {
        DomainError::ValidationError(_) => bad_object_response(),

        DomainError::UnsupportedType { key, kind } => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::error(format!(
                "unsupported value for field '{}': {}",
                key, kind
            ))),
        ),

        // Logged by the ingestion service
        DomainError::DecodeError(_)
        | DomainError::SessionClosed
        | DomainError::RepositoryError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error("internal error")),
        ),
    }
}
