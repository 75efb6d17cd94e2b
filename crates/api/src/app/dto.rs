use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use userverse_core::{
    CompanyAddress, CompanyChanges, CompanyFilter, CompanyId, DefaultRole, DomainResult,
    MemberFilter, Membership, NewCompany, Pagination, RoleChanges, RoleFilter, UserCompanyFilter,
    UserId,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<CompanyAddress>,
}

impl CreateCompanyRequest {
    pub fn into_parts(self) -> (NewCompany, Option<CompanyAddress>) {
        let new = NewCompany {
            name: self.name,
            description: self.description,
            industry: self.industry,
            email: self.email,
            phone_number: self.phone_number,
        };
        (new, self.address)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCompanyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<CompanyAddress>,
}

impl UpdateCompanyRequest {
    pub fn into_parts(self) -> (CompanyChanges, Option<CompanyAddress>) {
        let changes = CompanyChanges {
            name: self.name,
            description: self.description,
            industry: self.industry,
            phone_number: self.phone_number,
        };
        (changes, self.address)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl From<UpdateRoleRequest> for RoleChanges {
    fn from(req: UpdateRoleRequest) -> Self {
        RoleChanges {
            name: req.name,
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteRoleRequest {
    pub role_name_to_delete: String,
    pub replacement_role_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default = "default_member_role")]
    pub role: String,
}

fn default_member_role() -> String {
    DefaultRole::VIEWER.name.to_string()
}

// -------------------------
// Query DTOs (flat: `serde_urlencoded` does not mix `flatten` with numbers)
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleQuery {
    pub fn into_parts(self) -> DomainResult<(RoleFilter, Pagination)> {
        let page = Pagination::new(self.limit, self.offset)?;
        let filter = RoleFilter {
            name: self.name,
            description: self.description,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub role_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl MemberQuery {
    pub fn into_parts(self) -> DomainResult<(MemberFilter, Pagination)> {
        let page = Pagination::new(self.limit, self.offset)?;
        let filter = MemberFilter {
            role_name: self.role_name,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserCompanyQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub role_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
}

impl UserCompanyQuery {
    pub fn into_parts(self) -> DomainResult<(UserCompanyFilter, Pagination)> {
        let page = Pagination::new(self.limit, self.offset)?;
        let filter = UserCompanyFilter {
            role_name: self.role_name,
            company: CompanyFilter {
                name: self.name,
                description: self.description,
                industry: self.industry,
                email: self.email,
            },
        };
        Ok((filter, page))
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role_name: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<&Membership> for MembershipView {
    fn from(m: &Membership) -> Self {
        Self {
            user_id: m.user_id,
            company_id: m.company_id,
            role_name: m.role_name.clone(),
            created_at: m.timestamps.created_at,
            closed_at: m.timestamps.closed_at,
        }
    }
}

/// `{"message": ..., "data": ...}` with the given status.
pub fn envelope(status: StatusCode, message: &str, data: impl Serialize) -> axum::response::Response {
    (
        status,
        axum::Json(serde_json::json!({
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

/// Map a service result onto the success envelope or an error body.
pub fn respond<T: Serialize>(
    result: DomainResult<T>,
    status: StatusCode,
    message: &str,
) -> axum::response::Response {
    match result {
        Ok(data) => envelope(status, message, data),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub fn parse_company_id(raw: &str) -> Result<CompanyId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_user_id(raw: &str) -> Result<UserId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}
