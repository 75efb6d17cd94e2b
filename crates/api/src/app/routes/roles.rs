use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};

use userverse_core::RoleDeletion;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .roles
        .create_role(company_id, &body.name, body.description, caller.actor())
        .await
        .map(|role| role.view());
    dto::respond(result, StatusCode::CREATED, "Role created")
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path((id, name)): Path<(String, String)>,
    Json(body): Json<dto::UpdateRoleRequest>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .roles
        .update_role(company_id, &name, body.into(), caller.actor())
        .await
        .map(|role| role.view());
    dto::respond(result, StatusCode::OK, "Role updated")
}

/// `DELETE /company/:id/role` with `{role_name_to_delete, replacement_role_name}`.
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DeleteRoleRequest>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let deletion = match RoleDeletion::new(body.role_name_to_delete, body.replacement_role_name) {
        Ok(d) => d,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let result = services
        .roles
        .delete_role_and_reassign(company_id, &deletion, caller.actor())
        .await;
    dto::respond(result, StatusCode::OK, "Role deleted")
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::RoleQuery>,
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
        .roles
        .list_roles(company_id, &filter, page, caller.actor())
        .await
        .map(|roles| roles.map(|role| role.view()));
    dto::respond(result, StatusCode::OK, "Roles retrieved")
}
