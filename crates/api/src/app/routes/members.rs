use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub async fn add_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddMemberRequest>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .memberships
        .link_by_email(company_id, &body.email, &body.role, caller.actor())
        .await;
    dto::respond(result, StatusCode::CREATED, "User added to company")
}

pub async fn remove_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, user_id)): Path<(String, String)>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id = match dto::parse_user_id(&user_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .memberships
        .unlink(company_id, user_id, caller.actor())
        .await
        .map(|membership| dto::MembershipView::from(&membership));
    dto::respond(result, StatusCode::OK, "User removed from company")
}

pub async fn list_members(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::MemberQuery>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let (filter, page) = match query.into_parts() {
        Ok(parts) => parts,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services
        .memberships
        .list_members(company_id, &filter, page, caller.actor())
        .await;
    dto::respond(result, StatusCode::OK, "Company users retrieved")
}
