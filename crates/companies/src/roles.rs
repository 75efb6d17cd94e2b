//! Role Lifecycle Manager.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use userverse_core::role::validate_role_name;
use userverse_core::{
    ActorSnapshot, CompanyId, DefaultRole, DomainError, DomainResult, Entity, MetadataEntry,
    MetadataField, NewRole, Paginated, Pagination, Role, RoleChanges, RoleDeletion, RoleFilter,
};
use userverse_infra::{Database, Notification, NotificationQueue, Transaction};

use crate::access;

/// Result of [`RoleLifecycle::delete_role_and_reassign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDeletionOutcome {
    pub message: String,
    pub users_reassigned: u64,
}

/// Per-company role management. Every operation requires the caller to be
/// an Administrator of the company.
#[derive(Clone)]
pub struct RoleLifecycle {
    db: Arc<dyn Database>,
    notifications: NotificationQueue,
}

impl RoleLifecycle {
    pub fn new(db: Arc<dyn Database>, notifications: NotificationQueue) -> Self {
        Self { db, notifications }
    }

    #[instrument(skip(self, description, actor), fields(actor_id = %actor.id), err)]
    pub async fn create_role(
        &self,
        company_id: CompanyId,
        name: &str,
        description: Option<String>,
        actor: &ActorSnapshot,
    ) -> DomainResult<Role> {
        validate_role_name(name)?;

        let mut tx = self.db.begin().await?;
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), actor.id, company_id).await?;
        access::active_company(tx.as_mut(), company_id).await?;

        tx.insert_role(NewRole {
            company_id,
            name: name.to_string(),
            description,
        })
        .await?;
        let role = tx
            .set_role_metadata(
                company_id,
                name,
                MetadataField::Primary,
                MetadataEntry::CreatedBy(actor.clone()),
            )
            .await?;
        tx.commit().await?;

        info!(%company_id, role_name = name, "role created");
        Ok(role)
    }

    /// Partial update. Default roles keep their names.
    #[instrument(skip(self, changes, actor), fields(actor_id = %actor.id), err)]
    pub async fn update_role(
        &self,
        company_id: CompanyId,
        name: &str,
        changes: RoleChanges,
        actor: &ActorSnapshot,
    ) -> DomainResult<Role> {
        if changes.is_empty() {
            return Err(DomainError::validation("no role fields to update"));
        }
        if let Some(new_name) = changes.name.as_deref().filter(|n| *n != name) {
            if DefaultRole::is_default(name) {
                return Err(DomainError::validation(format!(
                    "default role '{name}' cannot be renamed"
                )));
            }
            validate_role_name(new_name)?;
        }

        let mut tx = self.db.begin().await?;
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), actor.id, company_id).await?;
        active_role(tx.as_mut(), company_id, name).await?;

        let role = tx.update_role(company_id, name, changes).await?;
        tx.commit().await?;

        info!(%company_id, role_name = %role.name, previous_name = name, "role updated");
        Ok(role)
    }

    /// Move every active holder of the deleted role to the replacement role,
    /// then close the deleted role. All or nothing.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id), err)]
    pub async fn delete_role_and_reassign(
        &self,
        company_id: CompanyId,
        deletion: &RoleDeletion,
        actor: &ActorSnapshot,
    ) -> DomainResult<RoleDeletionOutcome> {
        let doomed = deletion.name_to_delete();
        let replacement = deletion.replacement_name();

        let mut tx = self.db.begin().await?;
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), actor.id, company_id).await?;
        active_role(tx.as_mut(), company_id, doomed).await?;
        active_role(tx.as_mut(), company_id, replacement).await?;

        let holders = tx.list_active_memberships_with_role(company_id, doomed).await?;
        let mut users_reassigned = 0u64;
        for membership in holders {
            tx.set_membership_role(membership.id, replacement).await?;
            users_reassigned += 1;
        }

        tx.set_role_metadata(
            company_id,
            doomed,
            MetadataField::Primary,
            MetadataEntry::DeletedBy(actor.clone()),
        )
        .await?;
        tx.close_role(company_id, doomed).await?;
        tx.commit().await?;

        info!(%company_id, role_name = doomed, replacement, users_reassigned, "role deleted");
        self.notifications.publish(Notification::RoleDeleted {
            company_id,
            role_name: doomed.to_string(),
            replacement_role_name: replacement.to_string(),
            users_reassigned,
        });

        Ok(RoleDeletionOutcome {
            message: format!(
                "Role '{doomed}' deleted; {users_reassigned} user(s) reassigned to '{replacement}'"
            ),
            users_reassigned,
        })
    }

    #[instrument(skip(self, filter, caller), fields(caller_id = %caller.id), err)]
    pub async fn list_roles(
        &self,
        company_id: CompanyId,
        filter: &RoleFilter,
        page: Pagination,
        caller: &ActorSnapshot,
    ) -> DomainResult<Paginated<Role>> {
        let mut tx = self.db.begin().await?;
        access::require_admin(tx.as_mut(), caller.id, company_id).await?;
        access::active_company(tx.as_mut(), company_id).await?;
        Ok(tx.list_roles(company_id, filter, page).await?)
    }
}

async fn active_role(tx: &mut dyn Transaction, company_id: CompanyId, name: &str) -> DomainResult<Role> {
    tx.get_role(company_id, name)
        .await?
        .filter(|r| r.is_active())
        .ok_or_else(|| DomainError::not_found(format!("role '{name}' in company {company_id}")))
}
