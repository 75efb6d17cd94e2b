use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::CallerContext;

pub async fn create_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateCompanyRequest>,
) -> axum::response::Response {
    let (new, address) = body.into_parts();
    let result = services
        .companies
        .create_company(new, address, caller.actor())
        .await
        .map(|company| company.view());
    dto::respond(result, StatusCode::CREATED, "Company created")
}

pub async fn get_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .companies
        .get_company(company_id, caller.actor())
        .await
        .map(|company| company.view());
    dto::respond(result, StatusCode::OK, "Company retrieved")
}

pub async fn get_company_by_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(email): Path<String>,
) -> axum::response::Response {
    let result = services
        .companies
        .get_company_by_email(&email, caller.actor())
        .await
        .map(|company| company.view());
    dto::respond(result, StatusCode::OK, "Company retrieved")
}

pub async fn update_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateCompanyRequest>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let (changes, address) = body.into_parts();
    let result = services
        .companies
        .update_company(company_id, changes, address, caller.actor())
        .await
        .map(|company| company.view());
    dto::respond(result, StatusCode::OK, "Company updated")
}

pub async fn close_company(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let company_id = match dto::parse_company_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = services
        .companies
        .close_company(company_id, caller.actor())
        .await
        .map(|company| company.view());
    dto::respond(result, StatusCode::OK, "Company closed")
}
