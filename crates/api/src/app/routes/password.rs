use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    routing::patch,
    Json, Router,
};
use chrono::Utc;

use crate::app::dto;
use crate::app::services::AppServices;
use crate::middleware::basic_credentials;

pub fn router() -> Router {
    Router::new()
        .route("/request", patch(request_reset))
        .route("/validate-otp", patch(validate_otp))
}

/// `PATCH /password-reset/request` with `{"email": ...}`.
pub async fn request_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EmailRequest>,
) -> axum::response::Response {
    let result = services
        .password_reset
        .request_reset(&body.email, Utc::now())
        .await;
    dto::respond(
        result,
        StatusCode::OK,
        "A one-time password has been sent to your email",
    )
}

/// `PATCH /password-reset/validate-otp` with `Authorization: Basic
/// email:new_password` and `{"otp": ...}`.
pub async fn validate_otp(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(body): Json<dto::OtpRequest>,
) -> axum::response::Response {
    let credentials = match basic_credentials(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let result = services
        .password_reset
        .reset_with_otp(&credentials.email, &body.otp, &credentials.password, Utc::now())
        .await
        .map(|_| ());
    dto::respond(result, StatusCode::OK, "Password has been reset")
}
