//! Store error types
//!
//! Mirrors the retry-with-backoff classification used elsewhere in this
//! crate's storage layer: a `StoreError` knows whether it is worth retrying.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event not found")]
    EventNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("registration not found")]
    RegistrationNotFound,

    #[error("event counter out of bounds")]
    CounterOutOfBounds,

    #[error("unique constraint violated")]
    UniqueViolation,

    #[error("retry budget exhausted after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

impl StoreError {
    /// Transient storage faults worth retrying with backoff: connection
    /// loss, serialization/deadlock failures surfaced by Postgres as
    /// particular SQLSTATE codes.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Io(_)) | StoreError::Database(sqlx::Error::PoolTimedOut) => {
                true
            }
            StoreError::Database(sqlx::Error::Database(db_err)) => {
                matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}
