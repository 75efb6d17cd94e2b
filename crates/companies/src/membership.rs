//! Membership Authority: who belongs to which company, under which role.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use userverse_core::{
    ActorSnapshot, CompanyId, CompanyMember, DefaultRole, DomainError, DomainResult, Entity,
    MemberFilter, Membership, MetadataEntry, MetadataField, NewMembership, Paginated, Pagination,
    User, UserCompany, UserCompanyFilter, UserId,
};
use userverse_infra::{Database, Notification, NotificationQueue, Transaction};

use crate::access;

#[derive(Clone)]
pub struct MembershipAuthority {
    db: Arc<dyn Database>,
    notifications: NotificationQueue,
}

impl MembershipAuthority {
    pub fn new(db: Arc<dyn Database>, notifications: NotificationQueue) -> Self {
        Self { db, notifications }
    }

    pub async fn is_linked(
        &self,
        user_id: UserId,
        company_id: CompanyId,
        role_name: Option<&str>,
    ) -> DomainResult<bool> {
        let mut tx = self.db.begin().await?;
        access::is_linked(tx.as_mut(), user_id, company_id, role_name).await
    }

    /// Open a membership for `user_id` under `role_name`. Administrator only.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id), err)]
    pub async fn link(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        role_name: &str,
        actor: &ActorSnapshot,
    ) -> DomainResult<Membership> {
        let mut tx = self.db.begin().await?;
        let user = tx
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active())
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        let (membership, invite) = link_in(tx.as_mut(), company_id, &user, role_name, actor).await?;
        tx.commit().await?;

        self.notifications.publish(invite);
        Ok(membership)
    }

    /// Same as [`MembershipAuthority::link`], addressing the user by email.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id), err)]
    pub async fn link_by_email(
        &self,
        company_id: CompanyId,
        email: &str,
        role_name: &str,
        actor: &ActorSnapshot,
    ) -> DomainResult<CompanyMember> {
        let mut tx = self.db.begin().await?;
        let user = tx
            .find_user_by_email(email)
            .await?
            .filter(|u| u.is_active())
            .ok_or_else(|| DomainError::not_found(format!("user with email {email}")))?;
        let (membership, invite) = link_in(tx.as_mut(), company_id, &user, role_name, actor).await?;
        tx.commit().await?;

        self.notifications.publish(invite);
        Ok(CompanyMember::new(&user, membership.role_name))
    }

    /// Close the active membership of `user_id`. Administrator only.
    ///
    /// The founder cannot remove themselves, and the last active
    /// Administrator membership of a company cannot be removed at all.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id), err)]
    pub async fn unlink(
        &self,
        company_id: CompanyId,
        user_id: UserId,
        actor: &ActorSnapshot,
    ) -> DomainResult<Membership> {
        let mut tx = self.db.begin().await?;
        // The administrator count below is only stable under the company lock.
        tx.lock_company(company_id).await?;
        access::require_admin(tx.as_mut(), actor.id, company_id).await?;

        let membership = tx
            .find_active_membership(user_id, company_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("user {user_id} is not a member of company {company_id}"))
            })?;

        if actor.id == user_id && membership.is_self_added() {
            warn!(%company_id, %user_id, "founder attempted self-removal");
            return Err(DomainError::forbidden("cannot remove the founding administrator"));
        }

        let admin = DefaultRole::ADMINISTRATOR.name;
        if membership.role_name == admin && tx.count_active_with_role(company_id, admin).await? <= 1 {
            warn!(%company_id, %user_id, "refused to remove last administrator");
            return Err(DomainError::forbidden(
                "a company must retain at least one active administrator",
            ));
        }

        tx.set_membership_metadata(
            membership.id,
            MetadataField::Primary,
            MetadataEntry::RemovedBy(actor.clone()),
        )
        .await?;
        let closed = tx.close_membership(membership.id).await?;
        tx.commit().await?;

        info!(%company_id, %user_id, membership_id = %closed.id, "user removed from company");
        Ok(closed)
    }

    /// Active members joined to their user records. Administrator only.
    #[instrument(skip(self, filter, caller), fields(caller_id = %caller.id), err)]
    pub async fn list_members(
        &self,
        company_id: CompanyId,
        filter: &MemberFilter,
        page: Pagination,
        caller: &ActorSnapshot,
    ) -> DomainResult<Paginated<CompanyMember>> {
        let mut tx = self.db.begin().await?;
        access::require_admin(tx.as_mut(), caller.id, company_id).await?;
        access::active_company(tx.as_mut(), company_id).await?;
        Ok(tx.list_members(company_id, filter, page).await?)
    }

    /// Companies `user_id` is an active member of, with the role held in each.
    #[instrument(skip(self, filter), err)]
    pub async fn list_companies_for_user(
        &self,
        user_id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> DomainResult<Paginated<UserCompany>> {
        let mut tx = self.db.begin().await?;
        Ok(tx.list_companies_for_user(user_id, filter, page).await?)
    }
}

async fn link_in(
    tx: &mut dyn Transaction,
    company_id: CompanyId,
    user: &User,
    role_name: &str,
    actor: &ActorSnapshot,
) -> DomainResult<(Membership, Notification)> {
    // Role deletion takes the same lock, so the role cannot close under us.
    tx.lock_company(company_id).await?;
    access::require_admin(tx, actor.id, company_id).await?;
    let company = access::active_company(tx, company_id).await?;

    let role_active = tx
        .get_role(company_id, role_name)
        .await?
        .is_some_and(|r| r.is_active());
    if !role_active {
        return Err(DomainError::validation(format!(
            "'{role_name}' is not an active role of company {company_id}"
        )));
    }

    if tx.find_active_membership(user.id, company_id).await?.is_some() {
        return Err(DomainError::conflict(format!(
            "user {} is already a member of company {company_id}",
            user.id
        )));
    }

    let membership = tx
        .insert_membership(NewMembership {
            user_id: user.id,
            company_id,
            role_name: role_name.to_string(),
        })
        .await?;
    let membership = tx
        .set_membership_metadata(
            membership.id,
            MetadataField::Primary,
            MetadataEntry::AddedBy(actor.clone()),
        )
        .await?;

    info!(%company_id, user_id = %user.id, role_name, "user added to company");

    let invite = Notification::CompanyInvite {
        company_id,
        company_name: company.name.clone(),
        email: user.email.clone(),
        role_name: membership.role_name.clone(),
        invited_by: actor.email.clone(),
    };
    Ok((membership, invite))
}
