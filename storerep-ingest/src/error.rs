//! Error types for storerep-ingest

use crate::extractors::ExtractionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload over the size ceiling (413)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Upload of an unaccepted type (415)
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Conflict (409) - an extraction of the same kind is already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload understood but nothing usable in it (422)
    #[error("{0}")]
    Unprocessable(String),

    /// Extraction collaborator failed after all retries (502)
    #[error("{0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        let message = err.to_string();
        match err {
            ExtractionError::FileTooLarge { .. } => ApiError::PayloadTooLarge(message),
            ExtractionError::MissingFile => ApiError::BadRequest(message),
            ExtractionError::UnsupportedType(_) => ApiError::UnsupportedMediaType(message),
            ExtractionError::NoSheets
            | ExtractionError::UnmappedColumns
            | ExtractionError::Malformed(_)
            | ExtractionError::NoFieldsResolved => ApiError::Unprocessable(message),
            ExtractionError::Transport(_)
            | ExtractionError::Upstream { .. }
            | ExtractionError::InvalidResponse(_) => ApiError::BadGateway(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg),
            ApiError::UnsupportedMediaType(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                msg,
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "EXTRACTION_FAILED", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_mapping() {
        let err: ApiError = ExtractionError::FileTooLarge {
            size_bytes: 9_961_472,
            limit_bytes: 8 * 1024 * 1024,
        }
        .into();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
        assert_eq!(
            err.to_string(),
            "File is too large (9.5 MB). Maximum allowed size is 8.0 MB."
        );

        let err: ApiError = ExtractionError::UnmappedColumns.into();
        assert!(matches!(err, ApiError::Unprocessable(_)));

        let err: ApiError = ExtractionError::MissingFile.into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = ExtractionError::Upstream {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, ApiError::BadGateway(ref m) if m == "boom"));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (ApiError::UnsupportedMediaType("x".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::Unprocessable("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::BadGateway("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
