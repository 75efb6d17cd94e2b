//! Per-record metadata maps.
//!
//! Every record carries two JSON objects (`primary_meta_data` and
//! `secondary_meta_data`). The keys this system writes are modelled as
//! [`MetadataEntry`] variants so that writers and readers agree on the shape
//! of each value; [`MetadataEntry::Custom`] remains for ad hoc keys.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;
use crate::value_object::ValueObject;

pub const ADDRESS_KEY: &str = "address";
pub const ADDED_BY_KEY: &str = "added_by";
pub const REMOVED_BY_KEY: &str = "removed_by";
pub const CREATED_BY_KEY: &str = "created_by";
pub const DELETED_BY_KEY: &str = "deleted_by";
pub const PASSWORD_RESET_KEY: &str = "password_reset";

/// Snapshot of the acting user, frozen at the time of the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ValueObject for ActorSnapshot {}

/// Postal address stored on a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ValueObject for CompanyAddress {}

/// Outstanding password-reset request for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetTicket {
    /// PHC-format hash of the one-time password.
    pub otp_hash: String,
    pub created_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    /// Wrong codes submitted against this ticket.
    #[serde(default)]
    pub failed_attempts: u32,
}

impl ValueObject for PasswordResetTicket {}

/// Which of the two metadata maps an entry is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    #[serde(rename = "primary_meta_data")]
    Primary,
    #[serde(rename = "secondary_meta_data")]
    Secondary,
}

impl MetadataField {
    pub fn column(&self) -> &'static str {
        match self {
            MetadataField::Primary => "primary_meta_data",
            MetadataField::Secondary => "secondary_meta_data",
        }
    }
}

impl FromStr for MetadataField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary_meta_data" => Ok(MetadataField::Primary),
            "secondary_meta_data" => Ok(MetadataField::Secondary),
            other => Err(DomainError::validation(format!(
                "'{other}' is not a metadata field"
            ))),
        }
    }
}

/// A single key/value written into a metadata map.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataEntry {
    Address(CompanyAddress),
    AddedBy(ActorSnapshot),
    RemovedBy(ActorSnapshot),
    CreatedBy(ActorSnapshot),
    DeletedBy(ActorSnapshot),
    PasswordReset(PasswordResetTicket),
    Custom { key: String, value: Value },
}

impl MetadataEntry {
    pub fn key(&self) -> &str {
        match self {
            MetadataEntry::Address(_) => ADDRESS_KEY,
            MetadataEntry::AddedBy(_) => ADDED_BY_KEY,
            MetadataEntry::RemovedBy(_) => REMOVED_BY_KEY,
            MetadataEntry::CreatedBy(_) => CREATED_BY_KEY,
            MetadataEntry::DeletedBy(_) => DELETED_BY_KEY,
            MetadataEntry::PasswordReset(_) => PASSWORD_RESET_KEY,
            MetadataEntry::Custom { key, .. } => key,
        }
    }

    pub fn to_value(&self) -> DomainResult<Value> {
        let value = match self {
            MetadataEntry::Address(a) => serde_json::to_value(a),
            MetadataEntry::AddedBy(a)
            | MetadataEntry::RemovedBy(a)
            | MetadataEntry::CreatedBy(a)
            | MetadataEntry::DeletedBy(a) => serde_json::to_value(a),
            MetadataEntry::PasswordReset(t) => serde_json::to_value(t),
            MetadataEntry::Custom { value, .. } => Ok(value.clone()),
        };
        value.map_err(|e| DomainError::validation(format!("metadata '{}': {e}", self.key())))
    }
}

/// One JSON object of metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one key, leaving every sibling key untouched.
    pub fn insert(&mut self, entry: MetadataEntry) -> DomainResult<()> {
        let value = entry.to_value()?;
        self.0.insert(entry.key().to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn address(&self) -> Option<CompanyAddress> {
        self.typed(ADDRESS_KEY)
    }

    pub fn added_by(&self) -> Option<ActorSnapshot> {
        self.typed(ADDED_BY_KEY)
    }

    pub fn removed_by(&self) -> Option<ActorSnapshot> {
        self.typed(REMOVED_BY_KEY)
    }

    pub fn created_by(&self) -> Option<ActorSnapshot> {
        self.typed(CREATED_BY_KEY)
    }

    pub fn password_reset(&self) -> Option<PasswordResetTicket> {
        self.typed(PASSWORD_RESET_KEY)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Build from a stored JSON value; `null` or non-objects become empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    fn typed<T: ValueObject + DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// The pair of metadata maps carried by every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataMaps {
    pub primary_meta_data: Metadata,
    pub secondary_meta_data: Metadata,
}

impl MetadataMaps {
    pub fn field(&self, field: MetadataField) -> &Metadata {
        match field {
            MetadataField::Primary => &self.primary_meta_data,
            MetadataField::Secondary => &self.secondary_meta_data,
        }
    }

    pub fn field_mut(&mut self, field: MetadataField) -> &mut Metadata {
        match field {
            MetadataField::Primary => &mut self.primary_meta_data,
            MetadataField::Secondary => &mut self.secondary_meta_data,
        }
    }

    pub fn primary(&self) -> &Metadata {
        &self.primary_meta_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> ActorSnapshot {
        ActorSnapshot {
            id: UserId::new(),
            email: "a@x.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        }
    }

    #[test]
    fn insert_keeps_sibling_keys() {
        let mut meta = Metadata::new();
        meta.insert(MetadataEntry::Address(CompanyAddress {
            city: Some("Cape Town".to_string()),
            ..Default::default()
        }))
        .unwrap();
        meta.insert(MetadataEntry::CreatedBy(actor())).unwrap();

        assert_eq!(meta.address().unwrap().city.as_deref(), Some("Cape Town"));
        assert_eq!(meta.created_by().unwrap().email, "a@x.com");
    }

    #[test]
    fn insert_overwrites_same_key() {
        let mut meta = Metadata::new();
        meta.insert(MetadataEntry::Custom {
            key: "plan".to_string(),
            value: Value::from("free"),
        })
        .unwrap();
        meta.insert(MetadataEntry::Custom {
            key: "plan".to_string(),
            value: Value::from("pro"),
        })
        .unwrap();

        assert_eq!(meta.get("plan"), Some(&Value::from("pro")));
        assert_eq!(meta.as_map().len(), 1);
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        assert_eq!(
            "primary_meta_data".parse::<MetadataField>().unwrap(),
            MetadataField::Primary
        );
        let err = "tertiary".parse::<MetadataField>().unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn from_value_tolerates_null() {
        assert_eq!(Metadata::from_value(Value::Null), Metadata::new());
    }
}
