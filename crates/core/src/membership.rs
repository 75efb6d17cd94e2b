//! User ↔ Company ↔ Role association.

use serde::{Deserialize, Serialize};

use crate::company::{Company, CompanyFilter, CompanyView};
use crate::entity::{Entity, Timestamps};
use crate::id::{CompanyId, MembershipId, UserId};
use crate::metadata::MetadataMaps;
use crate::pagination::contains_ci;
use crate::user::{User, UserProfile};

/// One membership row.
///
/// At most one row per (user, company) is active at a time. Rows move
/// `ACTIVE → CLOSED` exactly once; closed rows are history and a re-invite
/// opens a fresh row.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role_name: String,
    pub timestamps: Timestamps,
    pub metadata: MetadataMaps,
}

impl Membership {
    /// The membership was opened by the member themselves (the company founder).
    pub fn is_self_added(&self) -> bool {
        self.metadata
            .primary()
            .added_by()
            .is_some_and(|actor| actor.id == self.user_id)
    }
}

impl Entity for Membership {
    type Id = MembershipId;

    fn id(&self) -> MembershipId {
        self.id
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

#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role_name: String,
}

/// A user as seen from a company's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMember {
    #[serde(flatten)]
    pub user: UserProfile,
    pub role_name: String,
}

impl CompanyMember {
    pub fn new(user: &User, role_name: impl Into<String>) -> Self {
        Self {
            user: user.profile(),
            role_name: role_name.into(),
        }
    }
}

/// A company as seen from a user's company list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCompany {
    #[serde(flatten)]
    pub company: CompanyView,
    pub role_name: String,
}

impl UserCompany {
    pub fn new(company: &Company, role_name: impl Into<String>) -> Self {
        Self {
            company: company.view(),
            role_name: role_name.into(),
        }
    }
}

/// Filters for a company's member list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    pub role_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl MemberFilter {
    pub fn matches(&self, membership: &Membership, user: &User) -> bool {
        contains_ci(Some(&membership.role_name), self.role_name.as_deref())
            && contains_ci(user.first_name.as_deref(), self.first_name.as_deref())
            && contains_ci(user.last_name.as_deref(), self.last_name.as_deref())
            && contains_ci(Some(&user.email), self.email.as_deref())
    }
}

/// Filters for a user's company list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserCompanyFilter {
    pub role_name: Option<String>,
    #[serde(flatten)]
    pub company: CompanyFilter,
}

impl UserCompanyFilter {
    pub fn matches(&self, membership: &Membership, company: &Company) -> bool {
        contains_ci(Some(&membership.role_name), self.role_name.as_deref())
            && self.company.matches(company)
    }
}
