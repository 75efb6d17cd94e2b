//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every failure that crosses a crate boundary is expressed as one of these
/// kinds. Storage adapters translate driver errors into `NotFound`,
/// `Conflict` or `Storage`; services raise `Forbidden` and `Validation` when a
/// business rule (rather than a storage constraint) is violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An entity or composite key was absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated (duplicate email, duplicate active role or membership).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input failed a business validation rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller lacks the required membership/role, or the action is protected.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Credentials or token could not be accepted.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Connectivity or integrity failure in the storage layer not otherwise classified.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Validation(m)
            | Self::Forbidden(m)
            | Self::Unauthorized(m)
            | Self::Storage(m) => m,
        }
    }
}
