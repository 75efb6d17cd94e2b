//! Access Gate.

use std::sync::Arc;

use tracing::{instrument, warn};

use userverse_core::{Company, CompanyId, DefaultRole, DomainError, DomainResult, Entity, UserId};
use userverse_infra::{Database, Transaction};

const NO_ACCESS: &str = "you do not have access to this company";

/// Answers whether a caller may act on a company.
#[derive(Clone)]
pub struct AccessGate {
    db: Arc<dyn Database>,
}

impl AccessGate {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// True if `user_id` holds an active membership in `company_id`, and
    /// (when given) that membership carries `role_name`.
    #[instrument(skip(self), err)]
    pub async fn is_linked(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role_name: Option<&str>,
    ) -> DomainResult<bool> {
        let mut tx = self.db.begin().await?;
        is_linked(tx.as_mut(), user_id, company_id, role_name).await
    }

    /// Like [`AccessGate::is_linked`], but a missing link is `Forbidden`.
    pub async fn require_membership(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role_name: Option<&str>,
    ) -> DomainResult<bool> {
        let mut tx = self.db.begin().await?;
        require(tx.as_mut(), user_id, company_id, role_name).await?;
        Ok(true)
    }
}

pub(crate) async fn is_linked(
    tx: &mut dyn Transaction,
    user_id: UserId,
    company_id: CompanyId,
    role_name: Option<&str>,
) -> DomainResult<bool> {
    let membership = tx.find_active_membership(user_id, company_id).await?;
    Ok(membership.is_some_and(|m| role_name.is_none_or(|role| m.role_name == role)))
}

pub(crate) async fn require(
    tx: &mut dyn Transaction,
    user_id: UserId,
    company_id: CompanyId,
    role_name: Option<&str>,
) -> DomainResult<()> {
    if is_linked(tx, user_id, company_id, role_name).await? {
        return Ok(());
    }
    warn!(%user_id, %company_id, required_role = ?role_name, "company access denied");
    Err(DomainError::forbidden(NO_ACCESS))
}

/// Shorthand for the administrative actions.
pub(crate) async fn require_admin(
    tx: &mut dyn Transaction,
    user_id: UserId,
    company_id: CompanyId,
) -> DomainResult<()> {
    require(tx, user_id, company_id, Some(DefaultRole::ADMINISTRATOR.name)).await
}

/// The company, if it exists and is not closed.
pub(crate) async fn active_company(
    tx: &mut dyn Transaction,
    company_id: CompanyId,
) -> DomainResult<Company> {
    tx.get_company(company_id)
        .await?
        .filter(|c| c.is_active())
        .ok_or_else(|| DomainError::not_found(format!("company {company_id}")))
}
