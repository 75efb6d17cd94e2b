//! Postgres-backed entity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate email, duplicate role name, second open membership |
//! | Database (foreign key violation) | `23503` | `Constraint` | Membership pointing at a missing role/user/company |
//! | Database (check constraint violation) | `23514` | `Constraint` | Invalid data |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | RowNotFound | N/A | `NotFound` | Unexpected missing row |
//! | Other | N/A | `Backend` | Network errors, pool closed, etc. |
//!
//! Filters use `ILIKE` with `%`, `_` and `\` escaped in the needle.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;

use userverse_core::{
    Company, CompanyChanges, CompanyFilter, CompanyId, CompanyMember, MemberFilter, Membership,
    MembershipId, Metadata, MetadataEntry, MetadataField, MetadataMaps, NewCompany,
    NewMembership, NewRole, NewUser, Paginated, Pagination, Role, RoleChanges, RoleFilter,
    Timestamps, User, UserChanges, UserCompany, UserCompanyFilter, UserFilter, UserId,
    UserProfile,
};

use super::{
    CompanyStore, Database, MembershipStore, RoleStore, StoreError, StoreResult, Transaction,
    UserStore,
};

const SCHEMA: &str = include_str!("../../migrations/0001_userverse.sql");

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone_number, password_hash, \
     created_at, updated_at, closed_at, primary_meta_data, secondary_meta_data";

const COMPANY_COLUMNS: &str = "id, name, description, industry, email, phone_number, \
     created_at, updated_at, closed_at, primary_meta_data, secondary_meta_data";

const ROLE_COLUMNS: &str = "company_id, name, description, \
     created_at, updated_at, closed_at, primary_meta_data, secondary_meta_data";

const MEMBERSHIP_COLUMNS: &str = "id, user_id, company_id, role_name, \
     created_at, updated_at, closed_at, primary_meta_data, secondary_meta_data";

/// Connection pool plus schema bootstrap.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgTransaction { tx: Some(tx) }))
    }
}

/// A live `sqlx` transaction. Dropping it without `commit` rolls back.
pub struct PgTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PgTransaction {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StoreError::backend("transaction already committed"))
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::backend("transaction already committed"))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for PgTransaction {
    #[instrument(skip_all, fields(email = %new.email), err)]
    async fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, phone_number, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(*UserId::new().as_uuid())
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.phone_number)
            .bind(&new.password_hash)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict(format!("user with email '{}' already exists", new.email))
                } else {
                    map_sqlx_error("insert_user", e)
                }
            })?;
        user_from_row(&row).map_err(|e| map_sqlx_error("insert_user", e))
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_user", e))
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_user_by_email", e))
    }

    async fn list_users(
        &mut self,
        filter: &UserFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<User>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE closed_at IS NULL");
        push_user_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users WHERE closed_at IS NULL"
        ));
        push_user_filters(&mut select, filter);
        push_page(&mut select, "created_at, id", page);
        let rows = select
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let records = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_users", e))?;
        Ok(paginated(records, page, total))
    }

    #[instrument(skip(self, changes), err)]
    async fn update_user(&mut self, id: UserId, changes: UserChanges) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                phone_number = COALESCE($4, phone_number), \
                password_hash = COALESCE($5, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.phone_number)
            .bind(changes.password_hash)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("update_user", e))
    }

    #[instrument(skip(self), err)]
    async fn close_user(&mut self, id: UserId) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("close_user", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("close_user", e))
    }

    async fn set_user_metadata(
        &mut self,
        id: UserId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<User> {
        let (key, value) = metadata_pair(&entry)?;
        let column = field.column();
        let sql = format!(
            "UPDATE users SET {column} = {column} || jsonb_build_object($2::text, $3::jsonb), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(key)
            .bind(value)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_user_metadata", e))?
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        user_from_row(&row).map_err(|e| map_sqlx_error("set_user_metadata", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Companies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CompanyStore for PgTransaction {
    #[instrument(skip_all, fields(email = %new.email), err)]
    async fn insert_company(&mut self, new: NewCompany) -> StoreResult<Company> {
        let sql = format!(
            "INSERT INTO companies (id, name, description, industry, email, phone_number) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(*CompanyId::new().as_uuid())
            .bind(&new.name)
            .bind(&new.description)
            .bind(&new.industry)
            .bind(&new.email)
            .bind(&new.phone_number)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict(format!(
                        "company with email '{}' already exists",
                        new.email
                    ))
                } else {
                    map_sqlx_error("insert_company", e)
                }
            })?;
        company_from_row(&row).map_err(|e| map_sqlx_error("insert_company", e))
    }

    async fn get_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("get_company", e))?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_company", e))
    }

    async fn lock_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("lock_company", e))?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("lock_company", e))
    }

    async fn find_company_by_email(&mut self, email: &str) -> StoreResult<Option<Company>> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("find_company_by_email", e))?;
        row.as_ref()
            .map(company_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_company_by_email", e))
    }

    async fn list_companies(
        &mut self,
        filter: &CompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Company>> {
        let mut count =
            QueryBuilder::new("SELECT COUNT(*) FROM companies c WHERE c.closed_at IS NULL");
        push_company_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("count_companies", e))?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {COMPANY_COLUMNS} FROM companies c WHERE c.closed_at IS NULL"
        ));
        push_company_filters(&mut select, filter);
        push_page(&mut select, "c.created_at, c.id", page);
        let rows = select
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_companies", e))?;

        let records = rows
            .iter()
            .map(company_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_companies", e))?;
        Ok(paginated(records, page, total))
    }

    #[instrument(skip(self, changes), err)]
    async fn update_company(
        &mut self,
        id: CompanyId,
        changes: CompanyChanges,
    ) -> StoreResult<Company> {
        let sql = format!(
            "UPDATE companies SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description), \
                industry = COALESCE($4, industry), \
                phone_number = COALESCE($5, phone_number), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(changes.name)
            .bind(changes.description)
            .bind(changes.industry)
            .bind(changes.phone_number)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("update_company", e))?
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        company_from_row(&row).map_err(|e| map_sqlx_error("update_company", e))
    }

    #[instrument(skip(self), err)]
    async fn close_company(&mut self, id: CompanyId) -> StoreResult<Company> {
        let sql = format!(
            "UPDATE companies SET closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("close_company", e))?
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        company_from_row(&row).map_err(|e| map_sqlx_error("close_company", e))
    }

    async fn set_company_metadata(
        &mut self,
        id: CompanyId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Company> {
        let (key, value) = metadata_pair(&entry)?;
        let column = field.column();
        let sql = format!(
            "UPDATE companies SET {column} = {column} || jsonb_build_object($2::text, $3::jsonb), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(key)
            .bind(value)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_company_metadata", e))?
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        company_from_row(&row).map_err(|e| map_sqlx_error("set_company_metadata", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl RoleStore for PgTransaction {
    #[instrument(skip_all, fields(company_id = %new.company_id, role = %new.name), err)]
    async fn insert_role(&mut self, new: NewRole) -> StoreResult<Role> {
        // A closed row with the same key is reopened; an open one yields no row.
        let sql = format!(
            "INSERT INTO roles (company_id, name, description) VALUES ($1, $2, $3) \
             ON CONFLICT (company_id, name) DO UPDATE SET \
                description = EXCLUDED.description, \
                primary_meta_data = '{{}}'::jsonb, \
                secondary_meta_data = '{{}}'::jsonb, \
                closed_at = NULL, \
                updated_at = NOW() \
             WHERE roles.closed_at IS NOT NULL \
             RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new.company_id.as_uuid())
            .bind(&new.name)
            .bind(&new.description)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("insert_role", e))?
            .ok_or_else(|| {
                StoreError::conflict(format!(
                    "role '{}' already exists in company {}",
                    new.name, new.company_id
                ))
            })?;
        role_from_row(&row).map_err(|e| map_sqlx_error("insert_role", e))
    }

    async fn get_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE company_id = $1 AND name = $2");
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(name)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?;
        row.as_ref()
            .map(role_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("get_role", e))
    }

    async fn list_roles(
        &mut self,
        company_id: CompanyId,
        filter: &RoleFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Role>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM roles WHERE closed_at IS NULL");
        push_role_filters(&mut count, company_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("count_roles", e))?;

        let mut select = QueryBuilder::new(format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE closed_at IS NULL"
        ));
        push_role_filters(&mut select, company_id, filter);
        push_page(&mut select, "created_at, name", page);
        let rows = select
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;

        let records = rows
            .iter()
            .map(role_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        Ok(paginated(records, page, total))
    }

    /// Renames cascade to `memberships.role_name` through the foreign key.
    #[instrument(skip(self, changes), fields(company_id = %company_id), err)]
    async fn update_role(
        &mut self,
        company_id: CompanyId,
        name: &str,
        changes: RoleChanges,
    ) -> StoreResult<Role> {
        let sql = format!(
            "UPDATE roles SET \
                name = COALESCE($3, name), \
                description = COALESCE($4, description), \
                updated_at = NOW() \
             WHERE company_id = $1 AND name = $2 RETURNING {ROLE_COLUMNS}"
        );
        let new_name = changes.name.clone();
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(name)
            .bind(changes.name)
            .bind(changes.description)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict(format!(
                        "role '{}' already exists in company {company_id}",
                        new_name.as_deref().unwrap_or(name)
                    ))
                } else {
                    map_sqlx_error("update_role", e)
                }
            })?
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("update_role", e))
    }

    #[instrument(skip(self), fields(company_id = %company_id), err)]
    async fn close_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Role> {
        let sql = format!(
            "UPDATE roles SET closed_at = NOW(), updated_at = NOW() \
             WHERE company_id = $1 AND name = $2 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(name)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("close_role", e))?
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("close_role", e))
    }

    async fn set_role_metadata(
        &mut self,
        company_id: CompanyId,
        name: &str,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Role> {
        let (key, value) = metadata_pair(&entry)?;
        let column = field.column();
        let sql = format!(
            "UPDATE roles SET {column} = {column} || jsonb_build_object($3::text, $4::jsonb), \
                updated_at = NOW() \
             WHERE company_id = $1 AND name = $2 RETURNING {ROLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(name)
            .bind(key)
            .bind(value)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_role_metadata", e))?
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;
        role_from_row(&row).map_err(|e| map_sqlx_error("set_role_metadata", e))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memberships
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MembershipStore for PgTransaction {
    #[instrument(
        skip_all,
        fields(user_id = %new.user_id, company_id = %new.company_id, role = %new.role_name),
        err
    )]
    async fn insert_membership(&mut self, new: NewMembership) -> StoreResult<Membership> {
        let sql = format!(
            "INSERT INTO memberships (id, user_id, company_id, role_name) \
             VALUES ($1, $2, $3, $4) RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(*MembershipId::new().as_uuid())
            .bind(new.user_id.as_uuid())
            .bind(new.company_id.as_uuid())
            .bind(&new.role_name)
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::conflict(format!(
                        "user {} already has an active membership in company {}",
                        new.user_id, new.company_id
                    ))
                } else {
                    map_sqlx_error("insert_membership", e)
                }
            })?;
        membership_from_row(&row).map_err(|e| map_sqlx_error("insert_membership", e))
    }

    async fn find_active_membership(
        &mut self,
        user_id: UserId,
        company_id: CompanyId,
    ) -> StoreResult<Option<Membership>> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE user_id = $1 AND company_id = $2 AND closed_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(company_id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("find_active_membership", e))?;
        row.as_ref()
            .map(membership_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("find_active_membership", e))
    }

    async fn list_active_memberships_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<Vec<Membership>> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE company_id = $1 AND role_name = $2 AND closed_at IS NULL \
             ORDER BY created_at, id \
             FOR UPDATE"
        );
        let rows = sqlx::query(&sql)
            .bind(company_id.as_uuid())
            .bind(role_name)
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_active_memberships_with_role", e))?;
        rows.iter()
            .map(membership_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_active_memberships_with_role", e))
    }

    async fn count_active_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships \
             WHERE company_id = $1 AND role_name = $2 AND closed_at IS NULL",
        )
        .bind(company_id.as_uuid())
        .bind(role_name)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("count_active_with_role", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn set_membership_role(
        &mut self,
        id: MembershipId,
        role_name: &str,
    ) -> StoreResult<Membership> {
        let sql = format!(
            "UPDATE memberships SET role_name = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(role_name)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_membership_role", e))?
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        membership_from_row(&row).map_err(|e| map_sqlx_error("set_membership_role", e))
    }

    #[instrument(skip(self), err)]
    async fn close_membership(&mut self, id: MembershipId) -> StoreResult<Membership> {
        let sql = format!(
            "UPDATE memberships SET closed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("close_membership", e))?
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        membership_from_row(&row).map_err(|e| map_sqlx_error("close_membership", e))
    }

    async fn set_membership_metadata(
        &mut self,
        id: MembershipId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Membership> {
        let (key, value) = metadata_pair(&entry)?;
        let column = field.column();
        let sql = format!(
            "UPDATE memberships SET {column} = {column} || jsonb_build_object($2::text, $3::jsonb), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {MEMBERSHIP_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(key)
            .bind(value)
            .fetch_optional(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("set_membership_metadata", e))?
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        membership_from_row(&row).map_err(|e| map_sqlx_error("set_membership_metadata", e))
    }

    async fn list_members(
        &mut self,
        company_id: CompanyId,
        filter: &MemberFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<CompanyMember>> {
        const FROM: &str = " FROM memberships m JOIN users u ON u.id = m.user_id \
             WHERE m.closed_at IS NULL AND u.closed_at IS NULL";

        let mut count = QueryBuilder::new(format!("SELECT COUNT(*){FROM}"));
        push_member_filters(&mut count, company_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("count_members", e))?;

        let mut select = QueryBuilder::new(format!(
            "SELECT u.id, u.first_name, u.last_name, u.email, u.phone_number, m.role_name{FROM}"
        ));
        push_member_filters(&mut select, company_id, filter);
        push_page(&mut select, "m.created_at, m.id", page);
        let rows = select
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_members", e))?;

        let records = rows
            .iter()
            .map(member_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_members", e))?;
        Ok(paginated(records, page, total))
    }

    async fn list_companies_for_user(
        &mut self,
        user_id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<UserCompany>> {
        const FROM: &str = " FROM memberships m JOIN companies c ON c.id = m.company_id \
             WHERE m.closed_at IS NULL AND c.closed_at IS NULL";

        let mut count = QueryBuilder::new(format!("SELECT COUNT(*){FROM}"));
        push_user_company_filters(&mut count, user_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("count_user_companies", e))?;

        let mut select = QueryBuilder::new(format!(
            "SELECT c.id, c.name, c.description, c.industry, c.email, c.phone_number, \
                c.created_at, c.updated_at, c.closed_at, \
                c.primary_meta_data, c.secondary_meta_data, m.role_name{FROM}"
        ));
        push_user_company_filters(&mut select, user_id, filter);
        push_page(&mut select, "m.created_at, m.id", page);
        let rows = select
            .build()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_companies_for_user", e))?;

        let records = rows
            .iter()
            .map(|row| {
                let company = company_from_row(row)?;
                let role_name: String = row.try_get("role_name")?;
                Ok(UserCompany::new(&company, role_name))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("list_companies_for_user", e))?;
        Ok(paginated(records, page, total))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query helpers
// ─────────────────────────────────────────────────────────────────────────────

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_ilike(qb: &mut QueryBuilder<'_, Postgres>, column: &str, needle: Option<&str>) {
    if let Some(needle) = needle {
        qb.push(" AND ")
            .push(column)
            .push(" ILIKE ")
            .push_bind(like_pattern(needle));
    }
}

fn push_user_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    push_ilike(qb, "first_name", filter.first_name.as_deref());
    push_ilike(qb, "last_name", filter.last_name.as_deref());
    push_ilike(qb, "email", filter.email.as_deref());
}

fn push_company_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &CompanyFilter) {
    push_ilike(qb, "c.name", filter.name.as_deref());
    push_ilike(qb, "c.description", filter.description.as_deref());
    push_ilike(qb, "c.industry", filter.industry.as_deref());
    push_ilike(qb, "c.email", filter.email.as_deref());
}

fn push_role_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    company_id: CompanyId,
    filter: &RoleFilter,
) {
    qb.push(" AND company_id = ").push_bind(*company_id.as_uuid());
    push_ilike(qb, "name", filter.name.as_deref());
    push_ilike(qb, "description", filter.description.as_deref());
}

fn push_member_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    company_id: CompanyId,
    filter: &MemberFilter,
) {
    qb.push(" AND m.company_id = ").push_bind(*company_id.as_uuid());
    push_ilike(qb, "m.role_name", filter.role_name.as_deref());
    push_ilike(qb, "u.first_name", filter.first_name.as_deref());
    push_ilike(qb, "u.last_name", filter.last_name.as_deref());
    push_ilike(qb, "u.email", filter.email.as_deref());
}

fn push_user_company_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: UserId,
    filter: &UserCompanyFilter,
) {
    qb.push(" AND m.user_id = ").push_bind(*user_id.as_uuid());
    push_ilike(qb, "m.role_name", filter.role_name.as_deref());
    push_company_filters(qb, &filter.company);
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, order_by: &str, page: Pagination) {
    qb.push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(i64::from(page.limit))
        .push(" OFFSET ")
        .push_bind(i64::from(page.offset));
}

fn paginated<T>(records: Vec<T>, page: Pagination, total: i64) -> Paginated<T> {
    Paginated {
        records,
        pagination: page.meta(u64::try_from(total).unwrap_or_default()),
    }
}

fn metadata_pair(entry: &MetadataEntry) -> StoreResult<(String, serde_json::Value)> {
    let value = entry
        .to_value()
        .map_err(|e| StoreError::constraint(e.message()))?;
    Ok((entry.key().to_string(), value))
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn timestamps_from_row(row: &PgRow) -> Result<Timestamps, sqlx::Error> {
    Ok(Timestamps {
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

fn metadata_from_row(row: &PgRow) -> Result<MetadataMaps, sqlx::Error> {
    Ok(MetadataMaps {
        primary_meta_data: Metadata::from_value(row.try_get("primary_meta_data")?),
        secondary_meta_data: Metadata::from_value(row.try_get("secondary_meta_data")?),
    })
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        password_hash: row.try_get("password_hash")?,
        timestamps: timestamps_from_row(row)?,
        metadata: metadata_from_row(row)?,
    })
}

fn company_from_row(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        id: CompanyId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        industry: row.try_get("industry")?,
        email: row.try_get("email")?,
        phone_number: row.try_get("phone_number")?,
        timestamps: timestamps_from_row(row)?,
        metadata: metadata_from_row(row)?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        timestamps: timestamps_from_row(row)?,
        metadata: metadata_from_row(row)?,
    })
}

fn membership_from_row(row: &PgRow) -> Result<Membership, sqlx::Error> {
    Ok(Membership {
        id: MembershipId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        company_id: CompanyId::from_uuid(row.try_get("company_id")?),
        role_name: row.try_get("role_name")?,
        timestamps: timestamps_from_row(row)?,
        metadata: metadata_from_row(row)?,
    })
}

fn member_from_row(row: &PgRow) -> Result<CompanyMember, sqlx::Error> {
    Ok(CompanyMember {
        user: UserProfile {
            id: UserId::from_uuid(row.try_get("id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
        },
        role_name: row.try_get("role_name")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("row in {operation}")),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("adm"), "%adm%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn schema_declares_partial_unique_membership_index() {
        assert!(SCHEMA.contains("WHERE closed_at IS NULL"));
        assert!(SCHEMA.contains("ON UPDATE CASCADE"));
        assert!(SCHEMA.contains("PRIMARY KEY (company_id, name)"));
    }

    #[test]
    fn every_table_selects_lifecycle_columns() {
        for columns in [USER_COLUMNS, COMPANY_COLUMNS, ROLE_COLUMNS, MEMBERSHIP_COLUMNS] {
            assert!(columns.ends_with("primary_meta_data, secondary_meta_data"));
            assert!(columns.contains("closed_at"));
        }
    }
}
