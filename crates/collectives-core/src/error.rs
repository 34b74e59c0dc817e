//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No slot available")]
    CapacityExhausted,

    #[error("Waiting list is full")]
    WaitingListFull,

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("License is invalid")]
    LicenseInvalid,

    #[error("License expires before the event ends")]
    LicenseExpired,

    #[error("Blocked by an active sanction")]
    Blocked,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound { entity, id: id.to_string() }
    }

    pub fn not_permitted(reason: impl Into<String>) -> Self {
        DomainError::NotPermitted(reason.into())
    }

    /// Listing never mutates; storage failures there are transient for the caller.
    pub fn into_listing_error(self) -> Self {
        match self {
            DomainError::DatabaseError(e) => DomainError::ServiceUnavailable(e),
            other => other,
        }
    }

    /// Stable upper-snake code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotAuthenticated => "NOT_AUTHENTICATED",
            DomainError::NotPermitted(_) => "NOT_PERMITTED",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::InvalidState(_) => "INVALID_STATE",
            DomainError::CapacityExhausted => "CAPACITY_EXHAUSTED",
            DomainError::WaitingListFull => "WAITING_LIST_FULL",
            DomainError::RegistrationClosed => "REGISTRATION_CLOSED",
            DomainError::LicenseInvalid => "LICENSE_INVALID",
            DomainError::LicenseExpired => "LICENSE_EXPIRED",
            DomainError::Blocked => "BLOCKED",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            DomainError::BadRequest(_) => "BAD_REQUEST",
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(errors.to_string())
    }
}
