//! Error taxonomy for core operations.

use thiserror::Error;

use crate::db::DbError;

/// Errors surfaced by workflow operations.
///
/// Authorization failures carry no detail about which check failed.
#[derive(Error, Debug)]
pub enum CareError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(DbError),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl From<DbError> for CareError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => CareError::NotFound(what),
            DbError::Constraint(what) => CareError::Conflict(what),
            other => CareError::Store(other),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for CareError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        CareError::LockPoisoned
    }
}

pub type CareResult<T> = Result<T, CareError>;
