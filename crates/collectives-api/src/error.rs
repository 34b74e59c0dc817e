// ============================================================================
// Collectives API - Error Mapping
// File: crates/collectives-api/src/error.rs
// ============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use collectives_core::DomainError;
use collectives_security::JwtError;
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Too many requests")]
    RateLimited,
}

/// HTTP status of a core error.
pub fn status_of(error: &DomainError) -> StatusCode {
    match error {
        DomainError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        DomainError::NotPermitted(_) | DomainError::Blocked => StatusCode::FORBIDDEN,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InvalidState(_)
        | DomainError::Conflict(_)
        | DomainError::CapacityExhausted
        | DomainError::WaitingListFull
        | DomainError::RegistrationClosed => StatusCode::CONFLICT,
        DomainError::LicenseInvalid | DomainError::LicenseExpired | DomainError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
        DomainError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Domain(DomainError::DatabaseError(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                // Storage details stay in the logs
                "Internal storage error".to_string(),
            ),
            ApiError::Domain(e) => (status_of(e), e.code(), e.to_string()),
            ApiError::InvalidToken(e) => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED", e.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        } else {
            tracing::warn!(code, error = %self, "request refused");
        }
        (status, Json(ApiResponse::<()>::error(code, &message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
