// sqlx::Error -> StoreError

use std::borrow::Cow;
use unitwork_core::error::StoreError;

/// Map a failed statement, transaction control command or connection open.
///
/// Extended result codes (<https://www.sqlite.org/rescode.html>) that a unit of
/// work meets get a readable message; lock contention and unopenable files are
/// reported as connection problems.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) => map_database_error(db_err.message(), db_err.code()),
        sqlx::Error::Configuration(_) | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

fn map_database_error(message: &str, code: Option<Cow<'_, str>>) -> StoreError {
    match code.as_deref() {
        // deferred foreign keys surface here on COMMIT
        Some("787") => {
            StoreError::Database(format!("Foreign key constraint violation: {}", message))
        }
        Some("1555") | Some("2067") => {
            StoreError::Database(format!("Unique constraint violation: {}", message))
        }
        Some("5") | Some("6") | Some("517") => {
            StoreError::Connection(format!("Database locked: {}", message))
        }
        Some("14") => StoreError::Connection(format!("Unable to open database: {}", message)),
        Some(code) => StoreError::Database(format!("Database error [{}]: {}", code, message)),
        None => StoreError::Database(format!("Database error: {}", message)),
    }
}
