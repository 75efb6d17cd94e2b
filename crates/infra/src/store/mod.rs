//! Entity store: persistent records for users, companies, roles and memberships.
//!
//! Every service operation opens one [`Transaction`] from a [`Database`],
//! performs its reads and writes through the per-entity store traits, and
//! calls [`Transaction::commit`]. Dropping a transaction without committing
//! rolls back everything written through it.

mod error;
pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use userverse_core::{
    Company, CompanyChanges, CompanyFilter, CompanyId, CompanyMember, MemberFilter, Membership,
    MembershipId, MetadataEntry, MetadataField, NewCompany, NewMembership, NewRole, NewUser,
    Paginated, Pagination, Role, RoleChanges, RoleFilter, User, UserChanges, UserCompany,
    UserCompanyFilter, UserFilter, UserId,
};

pub use error::{StoreError, StoreResult};
pub use in_memory::InMemoryDatabase;
pub use postgres::PgDatabase;

/// Source of transactions. Cheap to share behind an `Arc`.
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>>;
}

/// One unit of work across all entity kinds.
#[async_trait]
pub trait Transaction: UserStore + CompanyStore + RoleStore + MembershipStore {
    /// Make every write visible. Any later call on this transaction fails.
    async fn commit(&mut self) -> StoreResult<()>;
}

#[async_trait]
pub trait UserStore: Send {
    /// Fails with `Conflict` if the email is already taken (open or closed).
    async fn insert_user(&mut self, new: NewUser) -> StoreResult<User>;

    /// Returns closed users too; callers decide visibility.
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;

    /// Active users only, oldest first.
    async fn list_users(
        &mut self,
        filter: &UserFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<User>>;

    async fn update_user(&mut self, id: UserId, changes: UserChanges) -> StoreResult<User>;

    async fn close_user(&mut self, id: UserId) -> StoreResult<User>;

    /// Merge one key into one metadata map, leaving sibling keys untouched.
    async fn set_user_metadata(
        &mut self,
        id: UserId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<User>;
}

#[async_trait]
pub trait CompanyStore: Send {
    async fn insert_company(&mut self, new: NewCompany) -> StoreResult<Company>;

    async fn get_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>>;

    /// Like `get_company`, but holds the company row until the transaction
    /// ends. Membership and role writes on one company take this lock first,
    /// so their read-then-write checks run one transaction at a time.
    async fn lock_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>>;

    async fn find_company_by_email(&mut self, email: &str) -> StoreResult<Option<Company>>;

    async fn list_companies(
        &mut self,
        filter: &CompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Company>>;

    async fn update_company(
        &mut self,
        id: CompanyId,
        changes: CompanyChanges,
    ) -> StoreResult<Company>;

    async fn close_company(&mut self, id: CompanyId) -> StoreResult<Company>;

    async fn set_company_metadata(
        &mut self,
        id: CompanyId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Company>;
}

#[async_trait]
pub trait RoleStore: Send {
    /// Fails with `Conflict` if an active role with the same name exists in
    /// the company. A closed role with the same name is reopened instead,
    /// with empty metadata maps.
    async fn insert_role(&mut self, new: NewRole) -> StoreResult<Role>;

    /// Returns closed roles too.
    async fn get_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Option<Role>>;

    /// Active roles only.
    async fn list_roles(
        &mut self,
        company_id: CompanyId,
        filter: &RoleFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Role>>;

    /// Renames carry every membership (open or closed) along with the role.
    async fn update_role(
        &mut self,
        company_id: CompanyId,
        name: &str,
        changes: RoleChanges,
    ) -> StoreResult<Role>;

    async fn close_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Role>;

    async fn set_role_metadata(
        &mut self,
        company_id: CompanyId,
        name: &str,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Role>;
}

#[async_trait]
pub trait MembershipStore: Send {
    /// Fails with `Conflict` if an active membership already exists for the
    /// (user, company) pair.
    async fn insert_membership(&mut self, new: NewMembership) -> StoreResult<Membership>;

    async fn find_active_membership(
        &mut self,
        user_id: UserId,
        company_id: CompanyId,
    ) -> StoreResult<Option<Membership>>;

    /// Active memberships holding `role_name`, oldest first.
    async fn list_active_memberships_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<Vec<Membership>>;

    async fn count_active_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<u64>;

    async fn set_membership_role(
        &mut self,
        id: MembershipId,
        role_name: &str,
    ) -> StoreResult<Membership>;

    async fn close_membership(&mut self, id: MembershipId) -> StoreResult<Membership>;

    async fn set_membership_metadata(
        &mut self,
        id: MembershipId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Membership>;

    /// Active memberships joined to active users.
    async fn list_members(
        &mut self,
        company_id: CompanyId,
        filter: &MemberFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<CompanyMember>>;

    /// Active memberships joined to active companies.
    async fn list_companies_for_user(
        &mut self,
        user_id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<UserCompany>>;
}
