//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use clearance_domain::DomainError;
use clearance_scanner::ScannerError;

use crate::models::ErrorResponse;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or semantically invalid input; `path` names the offending field
    #[error("{message}")]
    Validation {
        message: String,
        path: Option<String>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A validation error on `path`
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// A validation error not tied to one field
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            path: None,
        }
    }

    /// Point a validation error at `path`
    pub fn at_path(self, path: impl Into<String>) -> Self {
        match self {
            ApiError::Validation { message, .. } => ApiError::Validation {
                message,
                path: Some(path.into()),
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::ValidationError { field, .. } => ApiError::Validation {
                message,
                path: Some(field).filter(|f| !f.is_empty()),
            },
            DomainError::BusinessRuleViolation { .. }
            | DomainError::InvalidStateTransition { .. } => ApiError::bad_request(message),
            DomainError::EntityNotFound { .. } => ApiError::NotFound(message),
            DomainError::PermissionDenied { .. } => ApiError::Forbidden(message),
            DomainError::Storage { .. } => ApiError::Internal(message),
        }
    }
}

impl From<ScannerError> for ApiError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::JobNotFound(_) => ApiError::NotFound(err.to_string()),
            ScannerError::UnsafePath(_) => ApiError::bad_request(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                ErrorResponse {
                    message: "Internal server error".to_string(),
                    path: None,
                }
            }
            ApiError::Validation { message, path } => ErrorResponse { message, path },
            other => ErrorResponse {
                message: other.to_string(),
                path: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::validation("purl", "bad"), StatusCode::BAD_REQUEST),
            (DomainError::rule("nope"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("Package", "x"), StatusCode::NOT_FOUND),
            (DomainError::forbidden("owner only"), StatusCode::FORBIDDEN),
            (
                DomainError::Storage {
                    reason: "disk".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_keeps_field_as_path() {
        match ApiError::from(DomainError::validation("purls[1]", "bad purl")) {
            ApiError::Validation { path, .. } => assert_eq!(path.as_deref(), Some("purls[1]")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = ApiError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
