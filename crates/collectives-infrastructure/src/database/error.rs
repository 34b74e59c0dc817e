//! Translation of `sqlx` failures into domain errors

use collectives_core::DomainError;
use tracing::error;

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Maps a storage failure raised while doing `context`.
///
/// Uniqueness violations, serialization failures and deadlocks surface as
/// `Conflict` so the caller can retry; everything else is a database error.
pub fn map_sqlx_error(context: &str, e: sqlx::Error) -> DomainError {
    error!("Database error {}: {}", context, e);
    let code = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());
    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => DomainError::Conflict(format!("duplicate entry while {}", context)),
        Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
            DomainError::Conflict(format!("concurrent update while {}, retry", context))
        }
        _ => DomainError::DatabaseError(e.to_string()),
    }
}

/// Rejects a stored enum value the domain does not know.
pub fn corrupt(column: &str, value: &str) -> DomainError {
    error!("Unexpected {} value in database: {}", column, value);
    DomainError::DatabaseError(format!("unexpected {} '{}'", column, value))
}
