use thiserror::Error;

use userverse_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity store failures.
///
/// | Source | StoreError | DomainError |
/// |--------|-----------|-------------|
/// | missing row | `NotFound` | `NotFound` |
/// | Postgres `23505` / duplicate key | `Conflict` | `Conflict` |
/// | Postgres `23503`, `23514` / dangling reference | `Constraint` | `Validation` |
/// | anything else | `Backend` | `Storage` |
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Constraint(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => DomainError::not_found(err.to_string()),
            StoreError::Conflict(msg) => DomainError::conflict(msg),
            StoreError::Constraint(msg) => DomainError::validation(msg),
            StoreError::Backend(msg) => DomainError::storage(msg),
        }
    }
}
