//! HTTP boundary for the error taxonomy
//!
//! The only place status codes exist. Handlers return
//! `Result<_, ApiError>` and the conversion below produces the
//! `{detail, code}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use engram_types::{error::ErrorBody, MemoryError};
use tracing::error;

/// Wrapper so `?` works on `MemoryError` inside handlers
#[derive(Debug)]
pub struct ApiError(pub MemoryError);

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MemoryError::BadInput(_) => StatusCode::BAD_REQUEST,
            MemoryError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            MemoryError::AccessDenied(_) => StatusCode::FORBIDDEN,
            MemoryError::NotFound(_) => StatusCode::NOT_FOUND,
            MemoryError::ProviderUnavailable(_)
            | MemoryError::StoreUnavailable(_)
            | MemoryError::ProjectionFailed(_)
            | MemoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(code = self.0.code(), "request failed: {}", self.0);
        }

        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}
