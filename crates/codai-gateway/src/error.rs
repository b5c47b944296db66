//! Error types for the Gateway

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use codai_core::{CodaiError, ValidationError};
use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Core error: {0}")]
    Core(#[from] CodaiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl GatewayError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        GatewayError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Core(e) if e.as_validation().is_some() => StatusCode::BAD_REQUEST,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "validation_error",
            StatusCode::NOT_FOUND => "not_found",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::from(ValidationError::MissingField("title")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::not_found("memory", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let wrapped =
            CodaiError::from(ValidationError::MissingField("name")).context("loading flags");
        assert_eq!(
            GatewayError::from(wrapped).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = GatewayError::not_found("memory", "abc");
        assert_eq!(err.to_string(), "memory not found: abc");
    }
}
