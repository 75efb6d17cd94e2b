//! `userverse-auth` — credential handling, decoupled from HTTP and storage.
//!
//! - password hashing (Argon2id)
//! - access tokens (HS256 JWT)
//! - one-time passwords for password reset
//! - HTTP Basic credential parsing

pub mod basic;
pub mod claims;
pub mod error;
pub mod jwt;
pub mod otp;
pub mod password;

pub use basic::BasicCredentials;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use jwt::{Hs256Jwt, IssuedToken, JwtValidator};
pub use otp::generate_otp;
pub use password::{hash_password, verify_password};
