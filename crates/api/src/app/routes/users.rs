use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;

use userverse_users::{ProfileUpdate, Registration};

use crate::app::dto;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::CallerContext;
use crate::middleware::basic_credentials;

/// `POST /user` with `Authorization: Basic email:password` and a JSON profile.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(profile): Json<Registration>,
) -> axum::response::Response {
    let credentials = match basic_credentials(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let result = services
        .accounts
        .register(&credentials, profile)
        .await
        .map(|user| user.profile());
    dto::respond(result, StatusCode::CREATED, "User created")
}

/// `PATCH /user/login` with `Authorization: Basic email:password`.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let credentials = match basic_credentials(&headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let result = services.accounts.login(&credentials, Utc::now()).await;
    dto::respond(result, StatusCode::OK, "Login successful")
}

pub async fn get_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    let result = services
        .accounts
        .get_user(caller.user_id())
        .await
        .map(|user| user.profile());
    dto::respond(result, StatusCode::OK, "User retrieved")
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<ProfileUpdate>,
) -> axum::response::Response {
    let result = services
        .accounts
        .update_user(caller.user_id(), body)
        .await
        .map(|user| user.profile());
    dto::respond(result, StatusCode::OK, "User updated")
}

pub async fn deactivate_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    let result = services
        .accounts
        .deactivate(caller.user_id())
        .await
        .map(|user| user.profile());
    dto::respond(result, StatusCode::OK, "User deactivated")
}

pub async fn my_companies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<dto::UserCompanyQuery>,
) -> axum::response::Response {
    let (filter, page) = match query.into_parts() {
        Ok(parts) => parts,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services
        .accounts
        .list_companies(caller.user_id(), &filter, page)
        .await;
    dto::respond(result, StatusCode::OK, "Companies retrieved")
}
