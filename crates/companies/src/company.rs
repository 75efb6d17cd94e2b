//! Company lifecycle.

use std::sync::Arc;

use tracing::{info, instrument};

use userverse_core::{
    ActorSnapshot, Company, CompanyAddress, CompanyChanges, CompanyId, DefaultRole, DomainError,
    DomainResult, Entity, MetadataEntry, MetadataField, NewCompany, NewMembership, NewRole,
};
use userverse_infra::Database;

use crate::access;

#[derive(Clone)]
pub struct CompanyService {
    db: Arc<dyn Database>,
}

impl CompanyService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Create a company, seed its default roles and make `creator` its first
    /// Administrator. Nothing is written unless every step succeeds.
    #[instrument(skip(self, new, address, creator), fields(email = %new.email, creator_id = %creator.id), err)]
    pub async fn create_company(
        &self,
        new: NewCompany,
        address: Option<CompanyAddress>,
        creator: &ActorSnapshot,
    ) -> DomainResult<Company> {
        if new.email.trim().is_empty() {
            return Err(DomainError::validation("company email is required"));
        }

        let mut tx = self.db.begin().await?;
        let mut company = tx.insert_company(new).await?;
        let company_id = company.id;

        if let Some(address) = address {
            company = tx
                .set_company_metadata(company_id, MetadataField::Primary, MetadataEntry::Address(address))
                .await?;
        }

        for role in DefaultRole::ALL {
            tx.insert_role(NewRole {
                company_id,
                name: role.name.to_string(),
                description: Some(role.description.to_string()),
            })
            .await?;
            tx.set_role_metadata(
                company_id,
                role.name,
                MetadataField::Primary,
                MetadataEntry::CreatedBy(creator.clone()),
            )
            .await?;
        }

        let founder = tx
            .insert_membership(NewMembership {
                user_id: creator.id,
                company_id,
                role_name: DefaultRole::ADMINISTRATOR.name.to_string(),
            })
            .await?;
        tx.set_membership_metadata(
            founder.id,
            MetadataField::Primary,
            MetadataEntry::AddedBy(creator.clone()),
        )
        .await?;

        tx.commit().await?;

        info!(%company_id, "company created");
        Ok(company)
    }

    /// Any active member may read the company.
    #[instrument(skip(self, caller), fields(caller_id = %caller.id), err)]
    pub async fn get_company(&self, company_id: CompanyId, caller: &ActorSnapshot) -> DomainResult<Company> {
        let mut tx = self.db.begin().await?;
        let company = access::active_company(tx.as_mut(), company_id).await?;
        access::require(tx.as_mut(), caller.id, company_id, None).await?;
        Ok(company)
    }

    #[instrument(skip(self, caller), fields(caller_id = %caller.id), err)]
    pub async fn get_company_by_email(&self, email: &str, caller: &ActorSnapshot) -> DomainResult<Company> {
        let mut tx = self.db.begin().await?;
        let company = tx
            .find_company_by_email(email)
            .await?
            .filter(|c| c.is_active())
            .ok_or_else(|| DomainError::not_found(format!("company with email {email}")))?;
        access::require(tx.as_mut(), caller.id, company.id, None).await?;
        Ok(company)
    }

    /// Partial update. Address fields that are given replace the stored ones;
    /// the rest are kept.
    #[instrument(skip(self, changes, address, caller), fields(caller_id = %caller.id), err)]
    pub async fn update_company(
        &self,
        company_id: CompanyId,
        changes: CompanyChanges,
        address: Option<CompanyAddress>,
        caller: &ActorSnapshot,
    ) -> DomainResult<Company> {
        if changes.is_empty() && address.is_none() {
            return Err(DomainError::validation("no company fields to update"));
        }

        let mut tx = self.db.begin().await?;
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), caller.id, company_id).await?;
        let mut company = access::active_company(tx.as_mut(), company_id).await?;

        if !changes.is_empty() {
            company = tx.update_company(company_id, changes).await?;
        }
        if let Some(update) = address {
            let merged = merge_address(company.address(), update);
            company = tx
                .set_company_metadata(company_id, MetadataField::Primary, MetadataEntry::Address(merged))
                .await?;
        }
        tx.commit().await?;

        info!(%company_id, "company updated");
        Ok(company)
    }

    /// Soft delete. Administrator only.
    #[instrument(skip(self, caller), fields(caller_id = %caller.id), err)]
    pub async fn close_company(&self, company_id: CompanyId, caller: &ActorSnapshot) -> DomainResult<Company> {
        let mut tx = self.db.begin().await?;
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), caller.id, company_id).await?;
        access::active_company(tx.as_mut(), company_id).await?;
        let company = tx.close_company(company_id).await?;
        tx.commit().await?;

        info!(%company_id, "company closed");
        Ok(company)
    }
}

fn merge_address(current: Option<CompanyAddress>, update: CompanyAddress) -> CompanyAddress {
    let current = current.unwrap_or_default();
    CompanyAddress {
        street: update.street.or(current.street),
        city: update.city.or(current.city),
        state: update.state.or(current.state),
        postal_code: update.postal_code.or(current.postal_code),
        country: update.country.or(current.country),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_merge_keeps_unset_fields() {
        let current = CompanyAddress {
            street: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            ..CompanyAddress::default()
        };
        let update = CompanyAddress {
            city: Some("Shelbyville".into()),
            country: Some("US".into()),
            ..CompanyAddress::default()
        };

        let merged = merge_address(Some(current), update);
        assert_eq!(merged.street.as_deref(), Some("1 Main St"));
        assert_eq!(merged.city.as_deref(), Some("Shelbyville"));
        assert_eq!(merged.country.as_deref(), Some("US"));
        assert!(merged.state.is_none());
    }
}
