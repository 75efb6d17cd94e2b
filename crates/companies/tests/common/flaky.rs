//! A `Database` whose transactions fail at a chosen write, after earlier
//! writes of the same transaction have already gone through.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use userverse_core::{
    Company, CompanyChanges, CompanyFilter, CompanyId, CompanyMember, MemberFilter, Membership,
    MembershipId, MetadataEntry, MetadataField, NewCompany, NewMembership, NewRole, NewUser,
    Paginated, Pagination, Role, RoleChanges, RoleFilter, User, UserChanges, UserCompany,
    UserCompanyFilter, UserFilter, UserId,
};
use userverse_infra::store::{CompanyStore, MembershipStore, RoleStore, UserStore};
use userverse_infra::{Database, InMemoryDatabase, StoreError, StoreResult, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// The nth `set_membership_role` of a transaction (1-based).
    SetMembershipRole(usize),
    InsertMembership,
}

#[derive(Clone, Default)]
pub struct FlakyDatabase {
    pub inner: Arc<InMemoryDatabase>,
    fail_point: Arc<Mutex<Option<FailPoint>>>,
}

impl FlakyDatabase {
    pub fn fail_at(&self, point: FailPoint) {
        *self.fail_point.lock().unwrap() = Some(point);
    }

    pub fn heal(&self) {
        *self.fail_point.lock().unwrap() = None;
    }
}

#[async_trait]
impl Database for FlakyDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let fail_point = *self.fail_point.lock().unwrap();
        let inner = self.inner.begin().await?;
        Ok(Box::new(FlakyTransaction {
            inner,
            fail_point,
            role_updates: 0,
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn Transaction>,
    fail_point: Option<FailPoint>,
    role_updates: usize,
}

fn injected(op: &str) -> StoreError {
    StoreError::backend(format!("injected failure in {op}"))
}

#[async_trait]
impl Transaction for FlakyTransaction {
    async fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit().await
    }
}

#[async_trait]
impl UserStore for FlakyTransaction {
    async fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        self.inner.insert_user(new).await
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn list_users(&mut self, filter: &UserFilter, page: Pagination) -> StoreResult<Paginated<User>> {
        self.inner.list_users(filter, page).await
    }

    async fn update_user(&mut self, id: UserId, changes: UserChanges) -> StoreResult<User> {
        self.inner.update_user(id, changes).await
    }

    async fn close_user(&mut self, id: UserId) -> StoreResult<User> {
        self.inner.close_user(id).await
    }

    async fn set_user_metadata(
        &mut self,
        id: UserId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<User> {
        self.inner.set_user_metadata(id, field, entry).await
    }
}

#[async_trait]
impl CompanyStore for FlakyTransaction {
    async fn insert_company(&mut self, new: NewCompany) -> StoreResult<Company> {
        self.inner.insert_company(new).await
    }

    async fn get_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        self.inner.get_company(id).await
    }

    async fn lock_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        self.inner.lock_company(id).await
    }

    async fn find_company_by_email(&mut self, email: &str) -> StoreResult<Option<Company>> {
        self.inner.find_company_by_email(email).await
    }

    async fn list_companies(
        &mut self,
        filter: &CompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Company>> {
        self.inner.list_companies(filter, page).await
    }

    async fn update_company(&mut self, id: CompanyId, changes: CompanyChanges) -> StoreResult<Company> {
        self.inner.update_company(id, changes).await
    }

    async fn close_company(&mut self, id: CompanyId) -> StoreResult<Company> {
        self.inner.close_company(id).await
    }

    async fn set_company_metadata(
        &mut self,
        id: CompanyId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Company> {
        self.inner.set_company_metadata(id, field, entry).await
    }
}

#[async_trait]
impl RoleStore for FlakyTransaction {
    async fn insert_role(&mut self, new: NewRole) -> StoreResult<Role> {
        self.inner.insert_role(new).await
    }

    async fn get_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Option<Role>> {
        self.inner.get_role(company_id, name).await
    }

    async fn list_roles(
        &mut self,
        company_id: CompanyId,
        filter: &RoleFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Role>> {
        self.inner.list_roles(company_id, filter, page).await
    }

    async fn update_role(
        &mut self,
        company_id: CompanyId,
        name: &str,
        changes: RoleChanges,
    ) -> StoreResult<Role> {
        self.inner.update_role(company_id, name, changes).await
    }

    async fn close_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Role> {
        self.inner.close_role(company_id, name).await
    }

    async fn set_role_metadata(
        &mut self,
        company_id: CompanyId,
        name: &str,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Role> {
        self.inner.set_role_metadata(company_id, name, field, entry).await
    }
}

#[async_trait]
impl MembershipStore for FlakyTransaction {
    async fn insert_membership(&mut self, new: NewMembership) -> StoreResult<Membership> {
        if self.fail_point == Some(FailPoint::InsertMembership) {
            return Err(injected("insert_membership"));
        }
        self.inner.insert_membership(new).await
    }

    async fn find_active_membership(
        &mut self,
        user_id: UserId,
        company_id: CompanyId,
    ) -> StoreResult<Option<Membership>> {
        self.inner.find_active_membership(user_id, company_id).await
    }

    async fn list_active_memberships_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<Vec<Membership>> {
        self.inner.list_active_memberships_with_role(company_id, role_name).await
    }

    async fn count_active_with_role(&mut self, company_id: CompanyId, role_name: &str) -> StoreResult<u64> {
        self.inner.count_active_with_role(company_id, role_name).await
    }

    async fn set_membership_role(&mut self, id: MembershipId, role_name: &str) -> StoreResult<Membership> {
        self.role_updates += 1;
        if self.fail_point == Some(FailPoint::SetMembershipRole(self.role_updates)) {
            return Err(injected("set_membership_role"));
        }
        self.inner.set_membership_role(id, role_name).await
    }

    async fn close_membership(&mut self, id: MembershipId) -> StoreResult<Membership> {
        self.inner.close_membership(id).await
    }

    async fn set_membership_metadata(
        &mut self,
        id: MembershipId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Membership> {
        self.inner.set_membership_metadata(id, field, entry).await
    }

    async fn list_members(
        &mut self,
        company_id: CompanyId,
        filter: &MemberFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<CompanyMember>> {
        self.inner.list_members(company_id, filter, page).await
    }

    async fn list_companies_for_user(
        &mut self,
        user_id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<UserCompany>> {
        self.inner.list_companies_for_user(user_id, filter, page).await
    }
}
