//! In-memory entity store for tests and local development.
//!
//! A transaction holds the table lock for its whole lifetime and works on a
//! private copy of the tables; `commit` swaps the copy in. Writers are
//! therefore serialised and a dropped transaction leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use userverse_core::{
    Company, CompanyChanges, CompanyFilter, CompanyId, CompanyMember, Entity, MemberFilter,
    Membership, MembershipId, MetadataEntry, MetadataField, NewCompany, NewMembership, NewRole,
    NewUser, Paginated, Pagination, Role, RoleChanges, RoleFilter, RoleKey, Timestamps, User,
    UserChanges, UserCompany, UserCompanyFilter, UserFilter, UserId,
};

use super::{
    CompanyStore, Database, MembershipStore, RoleStore, StoreError, StoreResult, Transaction,
    UserStore,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    companies: BTreeMap<CompanyId, Company>,
    roles: BTreeMap<RoleKey, Role>,
    memberships: BTreeMap<MembershipId, Membership>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<Tables>>,
    working: Tables,
}

impl InMemoryTransaction {
    fn tables(&mut self) -> StoreResult<&mut Tables> {
        if self.guard.is_none() {
            return Err(StoreError::backend("transaction already committed"));
        }
        Ok(&mut self.working)
    }
}

fn merge_metadata<E: Entity>(
    record: &mut E,
    field: MetadataField,
    entry: MetadataEntry,
) -> StoreResult<()> {
    record
        .metadata_mut()
        .field_mut(field)
        .insert(entry)
        .map_err(|e| StoreError::constraint(e.message()))?;
    record.timestamps_mut().touch(Utc::now());
    Ok(())
}

fn oldest_first<T: Entity>(a: &T, b: &T) -> core::cmp::Ordering {
    a.timestamps().created_at.cmp(&b.timestamps().created_at)
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| StoreError::backend("transaction already committed"))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryTransaction {
    async fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        let t = self.tables()?;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::conflict(format!(
                "user with email '{}' already exists",
                new.email
            )));
        }

        let user = User {
            id: UserId::new(),
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone_number: new.phone_number,
            password_hash: new.password_hash,
            timestamps: Timestamps::opened_at(Utc::now()),
            metadata: Default::default(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(
        &mut self,
        filter: &UserFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<User>> {
        let mut users: Vec<User> = self
            .tables()?
            .users
            .values()
            .filter(|u| u.is_active() && filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(oldest_first);
        Ok(page.apply(users))
    }

    async fn update_user(&mut self, id: UserId, changes: UserChanges) -> StoreResult<User> {
        let user = self
            .tables()?
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        changes.apply_to(user);
        user.timestamps.touch(Utc::now());
        Ok(user.clone())
    }

    async fn close_user(&mut self, id: UserId) -> StoreResult<User> {
        let user = self
            .tables()?
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        user.timestamps.close(Utc::now());
        Ok(user.clone())
    }

    async fn set_user_metadata(
        &mut self,
        id: UserId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<User> {
        let user = self
            .tables()?
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("user {id}")))?;
        merge_metadata(user, field, entry)?;
        Ok(user.clone())
    }
}

#[async_trait]
impl CompanyStore for InMemoryTransaction {
    async fn insert_company(&mut self, new: NewCompany) -> StoreResult<Company> {
        let t = self.tables()?;
        if t.companies.values().any(|c| c.email == new.email) {
            return Err(StoreError::conflict(format!(
                "company with email '{}' already exists",
                new.email
            )));
        }

        let company = Company {
            id: CompanyId::new(),
            name: new.name,
            description: new.description,
            industry: new.industry,
            email: new.email,
            phone_number: new.phone_number,
            timestamps: Timestamps::opened_at(Utc::now()),
            metadata: Default::default(),
        };
        t.companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn get_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        Ok(self.tables()?.companies.get(&id).cloned())
    }

    // The table lock already makes every transaction exclusive.
    async fn lock_company(&mut self, id: CompanyId) -> StoreResult<Option<Company>> {
        self.get_company(id).await
    }

    async fn find_company_by_email(&mut self, email: &str) -> StoreResult<Option<Company>> {
        Ok(self
            .tables()?
            .companies
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn list_companies(
        &mut self,
        filter: &CompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Company>> {
        let mut companies: Vec<Company> = self
            .tables()?
            .companies
            .values()
            .filter(|c| c.is_active() && filter.matches(c))
            .cloned()
            .collect();
        companies.sort_by(oldest_first);
        Ok(page.apply(companies))
    }

    async fn update_company(
        &mut self,
        id: CompanyId,
        changes: CompanyChanges,
    ) -> StoreResult<Company> {
        let company = self
            .tables()?
            .companies
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        changes.apply_to(company);
        company.timestamps.touch(Utc::now());
        Ok(company.clone())
    }

    async fn close_company(&mut self, id: CompanyId) -> StoreResult<Company> {
        let company = self
            .tables()?
            .companies
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        company.timestamps.close(Utc::now());
        Ok(company.clone())
    }

    async fn set_company_metadata(
        &mut self,
        id: CompanyId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Company> {
        let company = self
            .tables()?
            .companies
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("company {id}")))?;
        merge_metadata(company, field, entry)?;
        Ok(company.clone())
    }
}

#[async_trait]
impl RoleStore for InMemoryTransaction {
    async fn insert_role(&mut self, new: NewRole) -> StoreResult<Role> {
        let t = self.tables()?;
        if !t.companies.contains_key(&new.company_id) {
            return Err(StoreError::constraint(format!(
                "company {} does not exist",
                new.company_id
            )));
        }

        let key = RoleKey::new(new.company_id, new.name.clone());
        let now = Utc::now();
        if let Some(existing) = t.roles.get_mut(&key) {
            if existing.is_active() {
                return Err(StoreError::conflict(format!(
                    "role '{}' already exists in company {}",
                    new.name, new.company_id
                )));
            }
            existing.description = new.description;
            existing.metadata = Default::default();
            existing.timestamps.closed_at = None;
            existing.timestamps.touch(now);
            return Ok(existing.clone());
        }

        let role = Role {
            company_id: new.company_id,
            name: new.name,
            description: new.description,
            timestamps: Timestamps::opened_at(now),
            metadata: Default::default(),
        };
        t.roles.insert(key, role.clone());
        Ok(role)
    }

    async fn get_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Option<Role>> {
        Ok(self
            .tables()?
            .roles
            .get(&RoleKey::new(company_id, name))
            .cloned())
    }

    async fn list_roles(
        &mut self,
        company_id: CompanyId,
        filter: &RoleFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<Role>> {
        let mut roles: Vec<Role> = self
            .tables()?
            .roles
            .values()
            .filter(|r| r.company_id == company_id && r.is_active() && filter.matches(r))
            .cloned()
            .collect();
        roles.sort_by(|a, b| oldest_first(a, b).then_with(|| a.name.cmp(&b.name)));
        Ok(page.apply(roles))
    }

    async fn update_role(
        &mut self,
        company_id: CompanyId,
        name: &str,
        changes: RoleChanges,
    ) -> StoreResult<Role> {
        let t = self.tables()?;
        let key = RoleKey::new(company_id, name);
        let mut role = t
            .roles
            .remove(&key)
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;

        if let Some(new_name) = changes.name.filter(|n| n.as_str() != name) {
            let new_key = RoleKey::new(company_id, new_name.clone());
            if t.roles.contains_key(&new_key) {
                t.roles.insert(key, role);
                return Err(StoreError::conflict(format!(
                    "role '{new_name}' already exists in company {company_id}"
                )));
            }
            for m in t.memberships.values_mut() {
                if m.company_id == company_id && m.role_name == name {
                    m.role_name = new_name.clone();
                }
            }
            role.name = new_name;
        }
        if let Some(description) = changes.description {
            role.description = Some(description);
        }
        role.timestamps.touch(Utc::now());

        t.roles.insert(role.key(), role.clone());
        Ok(role)
    }

    async fn close_role(&mut self, company_id: CompanyId, name: &str) -> StoreResult<Role> {
        let role = self
            .tables()?
            .roles
            .get_mut(&RoleKey::new(company_id, name))
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;
        role.timestamps.close(Utc::now());
        Ok(role.clone())
    }

    async fn set_role_metadata(
        &mut self,
        company_id: CompanyId,
        name: &str,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Role> {
        let role = self
            .tables()?
            .roles
            .get_mut(&RoleKey::new(company_id, name))
            .ok_or_else(|| StoreError::not_found(format!("role '{name}' in company {company_id}")))?;
        merge_metadata(role, field, entry)?;
        Ok(role.clone())
    }
}

#[async_trait]
impl MembershipStore for InMemoryTransaction {
    async fn insert_membership(&mut self, new: NewMembership) -> StoreResult<Membership> {
        let t = self.tables()?;
        if !t.users.contains_key(&new.user_id) {
            return Err(StoreError::constraint(format!(
                "user {} does not exist",
                new.user_id
            )));
        }
        if !t
            .roles
            .contains_key(&RoleKey::new(new.company_id, new.role_name.clone()))
        {
            return Err(StoreError::constraint(format!(
                "role '{}' does not exist in company {}",
                new.role_name, new.company_id
            )));
        }
        if t.memberships.values().any(|m| {
            m.user_id == new.user_id && m.company_id == new.company_id && m.is_active()
        }) {
            return Err(StoreError::conflict(format!(
                "user {} already has an active membership in company {}",
                new.user_id, new.company_id
            )));
        }

        let membership = Membership {
            id: MembershipId::new(),
            user_id: new.user_id,
            company_id: new.company_id,
            role_name: new.role_name,
            timestamps: Timestamps::opened_at(Utc::now()),
            metadata: Default::default(),
        };
        t.memberships.insert(membership.id, membership.clone());
        Ok(membership)
    }

    async fn find_active_membership(
        &mut self,
        user_id: UserId,
        company_id: CompanyId,
    ) -> StoreResult<Option<Membership>> {
        Ok(self
            .tables()?
            .memberships
            .values()
            .find(|m| m.user_id == user_id && m.company_id == company_id && m.is_active())
            .cloned())
    }

    async fn list_active_memberships_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<Vec<Membership>> {
        let mut found: Vec<Membership> = self
            .tables()?
            .memberships
            .values()
            .filter(|m| m.company_id == company_id && m.role_name == role_name && m.is_active())
            .cloned()
            .collect();
        found.sort_by(oldest_first);
        Ok(found)
    }

    async fn count_active_with_role(
        &mut self,
        company_id: CompanyId,
        role_name: &str,
    ) -> StoreResult<u64> {
        Ok(self
            .tables()?
            .memberships
            .values()
            .filter(|m| m.company_id == company_id && m.role_name == role_name && m.is_active())
            .count() as u64)
    }

    async fn set_membership_role(
        &mut self,
        id: MembershipId,
        role_name: &str,
    ) -> StoreResult<Membership> {
        let t = self.tables()?;
        let company_id = t
            .memberships
            .get(&id)
            .map(|m| m.company_id)
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        if !t.roles.contains_key(&RoleKey::new(company_id, role_name)) {
            return Err(StoreError::constraint(format!(
                "role '{role_name}' does not exist in company {company_id}"
            )));
        }

        let membership = t
            .memberships
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        membership.role_name = role_name.to_string();
        membership.timestamps.touch(Utc::now());
        Ok(membership.clone())
    }

    async fn close_membership(&mut self, id: MembershipId) -> StoreResult<Membership> {
        let membership = self
            .tables()?
            .memberships
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        membership.timestamps.close(Utc::now());
        Ok(membership.clone())
    }

    async fn set_membership_metadata(
        &mut self,
        id: MembershipId,
        field: MetadataField,
        entry: MetadataEntry,
    ) -> StoreResult<Membership> {
        let membership = self
            .tables()?
            .memberships
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("membership {id}")))?;
        merge_metadata(membership, field, entry)?;
        Ok(membership.clone())
    }

    async fn list_members(
        &mut self,
        company_id: CompanyId,
        filter: &MemberFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<CompanyMember>> {
        let t = &*self.tables()?;
        let mut rows: Vec<(&Membership, &User)> = t
            .memberships
            .values()
            .filter(|m| m.company_id == company_id && m.is_active())
            .filter_map(|m| {
                t.users
                    .get(&m.user_id)
                    .filter(|u| u.is_active() && filter.matches(m, u))
                    .map(|u| (m, u))
            })
            .collect();
        rows.sort_by(|a, b| oldest_first(a.0, b.0));

        let members = rows
            .into_iter()
            .map(|(m, u)| CompanyMember::new(u, m.role_name.clone()))
            .collect();
        Ok(page.apply(members))
    }

    async fn list_companies_for_user(
        &mut self,
        user_id: UserId,
        filter: &UserCompanyFilter,
        page: Pagination,
    ) -> StoreResult<Paginated<UserCompany>> {
        let t = &*self.tables()?;
        let mut rows: Vec<(&Membership, &Company)> = t
            .memberships
            .values()
            .filter(|m| m.user_id == user_id && m.is_active())
            .filter_map(|m| {
                t.companies
                    .get(&m.company_id)
                    .filter(|c| c.is_active() && filter.matches(m, c))
                    .map(|c| (m, c))
            })
            .collect();
        rows.sort_by(|a, b| oldest_first(a.0, b.0));

        let companies = rows
            .into_iter()
            .map(|(m, c)| UserCompany::new(c, m.role_name.clone()))
            .collect();
        Ok(page.apply(companies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: email.to_string(),
            phone_number: None,
            password_hash: "hash".to_string(),
        }
    }

    fn new_company(email: &str) -> NewCompany {
        NewCompany {
            name: Some("Acme".to_string()),
            description: None,
            industry: Some("Widgets".to_string()),
            email: email.to_string(),
            phone_number: None,
        }
    }

    fn new_role(company_id: CompanyId, name: &str) -> NewRole {
        NewRole {
            company_id,
            name: name.to_string(),
            description: Some(format!("{name} role")),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let db = InMemoryDatabase::new();
        {
            let mut tx = db.begin().await.unwrap();
            tx.insert_user(new_user("a@x.com")).await.unwrap();
        }

        let mut tx = db.begin().await.unwrap();
        assert!(tx.find_user_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible_and_commit_is_final() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();
        tx.commit().await.unwrap();
        assert!(tx.get_user(user.id).await.is_err());
        assert!(tx.commit().await.is_err());
        drop(tx);

        let mut tx = db.begin().await.unwrap();
        assert_eq!(tx.get_user(user.id).await.unwrap().unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        tx.insert_user(new_user("a@x.com")).await.unwrap();
        let err = tx.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        tx.insert_company(new_company("c@x.com")).await.unwrap();
        let err = tx.insert_company(new_company("c@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn one_active_membership_per_pair() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();
        let company = tx.insert_company(new_company("c@x.com")).await.unwrap();
        tx.insert_role(new_role(company.id, "Viewer")).await.unwrap();

        let link = NewMembership {
            user_id: user.id,
            company_id: company.id,
            role_name: "Viewer".to_string(),
        };
        let first = tx.insert_membership(link.clone()).await.unwrap();
        let err = tx.insert_membership(link.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        tx.close_membership(first.id).await.unwrap();
        let second = tx.insert_membership(link).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn membership_requires_existing_role() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();
        let company = tx.insert_company(new_company("c@x.com")).await.unwrap();

        let err = tx
            .insert_membership(NewMembership {
                user_id: user.id,
                company_id: company.id,
                role_name: "Ghost".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn closed_role_is_reopened_on_insert() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let company = tx.insert_company(new_company("c@x.com")).await.unwrap();
        tx.insert_role(new_role(company.id, "Editor")).await.unwrap();

        let err = tx.insert_role(new_role(company.id, "Editor")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        tx.set_role_metadata(
            company.id,
            "Editor",
            MetadataField::Primary,
            MetadataEntry::Custom {
                key: "deleted_by".to_string(),
                value: serde_json::json!({ "email": "a@x.com" }),
            },
        )
        .await
        .unwrap();
        tx.close_role(company.id, "Editor").await.unwrap();
        let reopened = tx
            .insert_role(NewRole {
                description: Some("again".to_string()),
                ..new_role(company.id, "Editor")
            })
            .await
            .unwrap();
        assert!(reopened.is_active());
        assert_eq!(reopened.description.as_deref(), Some("again"));
        assert!(reopened.metadata.primary().as_map().is_empty());
    }

    #[tokio::test]
    async fn rename_carries_memberships() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();
        let company = tx.insert_company(new_company("c@x.com")).await.unwrap();
        tx.insert_role(new_role(company.id, "Editor")).await.unwrap();
        tx.insert_role(new_role(company.id, "Viewer")).await.unwrap();
        tx.insert_membership(NewMembership {
            user_id: user.id,
            company_id: company.id,
            role_name: "Editor".to_string(),
        })
        .await
        .unwrap();

        let err = tx
            .update_role(
                company.id,
                "Editor",
                RoleChanges {
                    name: Some("Viewer".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(tx.get_role(company.id, "Editor").await.unwrap().is_some());

        tx.update_role(
            company.id,
            "Editor",
            RoleChanges {
                name: Some("Author".to_string()),
                description: None,
            },
        )
        .await
        .unwrap();

        assert!(tx.get_role(company.id, "Editor").await.unwrap().is_none());
        let membership = tx
            .find_active_membership(user.id, company.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.role_name, "Author");
    }

    #[tokio::test]
    async fn metadata_merge_keeps_siblings() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();

        tx.set_user_metadata(
            user.id,
            MetadataField::Primary,
            MetadataEntry::Custom {
                key: "plan".to_string(),
                value: "pro".into(),
            },
        )
        .await
        .unwrap();
        let updated = tx
            .set_user_metadata(
                user.id,
                MetadataField::Primary,
                MetadataEntry::Custom {
                    key: "locale".to_string(),
                    value: "en".into(),
                },
            )
            .await
            .unwrap();

        let primary = updated.metadata.primary();
        assert!(primary.contains_key("plan"));
        assert!(primary.contains_key("locale"));
        assert!(updated.timestamps.updated_at.is_some());
    }

    #[tokio::test]
    async fn members_list_filters_and_paginates() {
        let db = InMemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();
        let company = tx.insert_company(new_company("c@x.com")).await.unwrap();
        tx.insert_role(new_role(company.id, "Administrator")).await.unwrap();
        tx.insert_role(new_role(company.id, "Viewer")).await.unwrap();

        for i in 0..5 {
            let user = tx.insert_user(new_user(&format!("u{i}@x.com"))).await.unwrap();
            let role = if i == 0 { "Administrator" } else { "Viewer" };
            tx.insert_membership(NewMembership {
                user_id: user.id,
                company_id: company.id,
                role_name: role.to_string(),
            })
            .await
            .unwrap();
        }

        let viewers = MemberFilter {
            role_name: Some("view".to_string()),
            ..Default::default()
        };
        let page = tx
            .list_members(company.id, &viewers, Pagination::new(Some(3), Some(0)).unwrap())
            .await
            .unwrap();
        assert_eq!(page.records.len(), 3);
        assert_eq!(page.pagination.total_records, 4);
        assert_eq!(page.pagination.total_pages, 2);
        assert!(page.records.iter().all(|m| m.role_name == "Viewer"));

        let all = tx
            .list_members(company.id, &MemberFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.records[0].user.email, "u0@x.com");
    }
}
