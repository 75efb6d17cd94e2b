//! HTTP Basic credentials (`Authorization: Basic base64(email:password)`).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::AuthError;

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl BasicCredentials {
    /// Parse a raw `Authorization` header value.
    pub fn from_header(value: &str) -> Result<Self, AuthError> {
        let encoded = value
            .strip_prefix("Basic ")
            .ok_or_else(|| AuthError::MalformedCredentials("expected Basic scheme".into()))?
            .trim();

        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| AuthError::MalformedCredentials(format!("base64: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError::MalformedCredentials("credentials are not UTF-8".into()))?;

        // Passwords may contain ':'; the email may not.
        let (email, password) = decoded
            .split_once(':')
            .ok_or_else(|| AuthError::MalformedCredentials("missing ':' separator".into()))?;

        if email.is_empty() {
            return Err(AuthError::MalformedCredentials("empty email".into()));
        }

        Ok(Self {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    pub fn to_header(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.email, self.password))
        )
    }
}
