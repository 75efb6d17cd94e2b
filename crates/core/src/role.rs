//! Company-scoped roles.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Timestamps};
use crate::error::{DomainError, DomainResult};
use crate::id::CompanyId;
use crate::metadata::MetadataMaps;
use crate::pagination::contains_ci;

pub const MAX_ROLE_NAME_LEN: usize = 256;

/// A role seeded into every company and protected from deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultRole {
    pub name: &'static str,
    pub description: &'static str,
}

impl DefaultRole {
    pub const ADMINISTRATOR: DefaultRole = DefaultRole {
        name: "Administrator",
        description: "Full access to manage users and data",
    };

    pub const VIEWER: DefaultRole = DefaultRole {
        name: "Viewer",
        description: "Read-only access to company data",
    };

    pub const ALL: [DefaultRole; 2] = [DefaultRole::ADMINISTRATOR, DefaultRole::VIEWER];

    pub fn is_default(name: &str) -> bool {
        Self::ALL.iter().any(|r| r.name == name)
    }
}

/// Composite identity of a role: names are unique within a company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleKey {
    pub company_id: CompanyId,
    pub name: String,
}

impl RoleKey {
    pub fn new(company_id: CompanyId, name: impl Into<String>) -> Self {
        Self {
            company_id,
            name: name.into(),
        }
    }
}

impl core::fmt::Display for RoleKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.company_id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
    pub timestamps: Timestamps,
    pub metadata: MetadataMaps,
}

impl Role {
    pub fn key(&self) -> RoleKey {
        RoleKey::new(self.company_id, self.name.clone())
    }

    pub fn view(&self) -> RoleView {
        RoleView {
            company_id: self.company_id,
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

impl Entity for Role {
    type Id = RoleKey;

    fn id(&self) -> RoleKey {
        self.key()
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn metadata(&self) -> &MetadataMaps {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut MetadataMaps {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleView {
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub company_id: CompanyId,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleFilter {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleFilter {
    pub fn matches(&self, role: &Role) -> bool {
        contains_ci(Some(&role.name), self.name.as_deref())
            && contains_ci(role.description.as_deref(), self.description.as_deref())
    }
}

/// Validate a role name supplied by a caller.
pub fn validate_role_name(name: &str) -> DomainResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("role name must not be empty"));
    }
    if trimmed.len() != name.len() {
        return Err(DomainError::validation(
            "role name must not start or end with whitespace",
        ));
    }
    if name.len() > MAX_ROLE_NAME_LEN {
        return Err(DomainError::validation(format!(
            "role name must be at most {MAX_ROLE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// A validated request to delete one role and move its members to another.
///
/// Construction rejects protected default roles and self-replacement, so an
/// invalid request never reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDeletion {
    name_to_delete: String,
    replacement_name: String,
}

impl RoleDeletion {
    pub fn new(
        name_to_delete: impl Into<String>,
        replacement_name: impl Into<String>,
    ) -> DomainResult<Self> {
        let name_to_delete = name_to_delete.into();
        let replacement_name = replacement_name.into();

        if DefaultRole::is_default(&name_to_delete) {
            return Err(DomainError::validation(format!(
                "default role '{name_to_delete}' cannot be deleted"
            )));
        }
        if name_to_delete == replacement_name {
            return Err(DomainError::validation(
                "replacement role must differ from the role being deleted",
            ));
        }
        validate_role_name(&replacement_name)?;

        Ok(Self {
            name_to_delete,
            replacement_name,
        })
    }

    pub fn name_to_delete(&self) -> &str {
        &self.name_to_delete
    }

    pub fn replacement_name(&self) -> &str {
        &self.replacement_name
    }
}
