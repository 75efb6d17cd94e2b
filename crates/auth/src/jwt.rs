//! HS256 access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use userverse_core::UserId;

use crate::claims::{JwtClaims, validate_claims};
use crate::error::AuthError;

/// Verifies bearer tokens. Object-safe so the HTTP layer can hold it behind `Arc<dyn _>`.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError>;
}

/// A freshly signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Shared-secret signer and validator.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for Hs256Jwt {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Jwt").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl Hs256Jwt {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        Ok(IssuedToken {
            access_token: token,
            token_type: "bearer",
            expires_at: claims.expires_at,
        })
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        // The time window lives in `issued_at`/`expires_at` and is checked by
        // `validate_claims`, not by the registered `exp` claim.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let claims = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))?;

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TokenValidationError;

    #[test]
    fn issued_token_validates() {
        let jwt = Hs256Jwt::new("test-secret", Duration::minutes(60));
        let now = Utc::now();
        let user = UserId::new();

        let issued = jwt.issue(user, "a@x.com", now).unwrap();
        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_at, now + Duration::minutes(60));

        let claims = jwt.validate(&issued.access_token, now).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email, "a@x.com");
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = Hs256Jwt::new("test-secret", Duration::minutes(1));
        let now = Utc::now();
        let issued = jwt.issue(UserId::new(), "a@x.com", now).unwrap();

        let err = jwt
            .validate(&issued.access_token, now + Duration::minutes(2))
            .unwrap_err();
        assert_eq!(err, AuthError::TokenRejected(TokenValidationError::Expired));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let issued = Hs256Jwt::new("one", Duration::minutes(5))
            .issue(UserId::new(), "a@x.com", now)
            .unwrap();

        let err = Hs256Jwt::new("two", Duration::minutes(5))
            .validate(&issued.access_token, now)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }
}
