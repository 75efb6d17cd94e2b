use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::warn;

use userverse_auth::{BasicCredentials, JwtValidator};
use userverse_core::DomainError;
use userverse_users::AccountService;

use crate::app::errors::{domain_error_to_response, json_error};
use crate::context::CallerContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub accounts: AccountService,
}

/// Resolve `Authorization: Bearer <jwt>` into a [`CallerContext`].
///
/// The token must verify and its subject must still be an active user.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(unauthorized)?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        warn!(error = %e, "bearer token rejected");
        unauthorized("invalid or expired token")
    })?;

    let user = state
        .accounts
        .get_user(claims.sub)
        .await
        .map_err(|e| match e {
            DomainError::NotFound(_) => unauthorized("account is not active"),
            other => domain_error_to_response(other),
        })?;

    req.extensions_mut().insert(CallerContext::new(user.snapshot()));

    Ok(next.run(req).await)
}

/// Parse `Authorization: Basic base64(email:password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, Response> {
    let header = authorization(headers).map_err(unauthorized)?;
    BasicCredentials::from_header(header).map_err(|e| unauthorized(e.to_string()))
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = authorization(headers)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or("expected Bearer scheme")?;

    let token = header.trim();
    if token.is_empty() {
        return Err("empty bearer token");
    }

    Ok(token)
}

fn authorization(headers: &HeaderMap) -> Result<&str, &'static str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing Authorization header")?
        .to_str()
        .map_err(|_| "Authorization header is not valid ASCII")
}

fn unauthorized(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}
