//! User account record.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Timestamps};
use crate::id::UserId;
use crate::metadata::{ActorSnapshot, MetadataMaps};
use crate::pagination::contains_ci;

/// Persisted user account.
///
/// `email` is unique across all users (open or closed).
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    /// Argon2id PHC string; never serialised outward.
    pub password_hash: String,
    pub timestamps: Timestamps,
    pub metadata: MetadataMaps,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
        }
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        display_name(self.first_name.as_deref(), self.last_name.as_deref(), &self.email)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
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

/// Public view of a user (no credential).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
}

/// Fields for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone_number.is_none()
            && self.password_hash.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(v) = self.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = self.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = self.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = self.password_hash {
            user.password_hash = v;
        }
    }
}

/// Substring filters for listing users.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        contains_ci(user.first_name.as_deref(), self.first_name.as_deref())
            && contains_ci(user.last_name.as_deref(), self.last_name.as_deref())
            && contains_ci(Some(&user.email), self.email.as_deref())
    }
}

pub(crate) fn display_name(first: Option<&str>, last: Option<&str>, fallback: &str) -> String {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}
