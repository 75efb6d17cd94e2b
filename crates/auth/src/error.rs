//! Authentication error types.

use thiserror::Error;
use userverse_core::DomainError;

use crate::claims::TokenValidationError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error(transparent)]
    TokenRejected(#[from] TokenValidationError),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Crypto(msg) => DomainError::storage(msg),
            other => DomainError::unauthorized(other.to_string()),
        }
    }
}
