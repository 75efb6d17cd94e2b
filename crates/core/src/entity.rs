//! Entity trait: identity + soft-delete lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::MetadataMaps;

/// Row lifecycle timestamps shared by every persisted record.
///
/// Records are never physically removed; `closed_at` marks a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn opened_at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: None,
            closed_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        self.closed_at = Some(now);
        self.updated_at = Some(now);
    }
}

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    fn timestamps(&self) -> &Timestamps;

    fn timestamps_mut(&mut self) -> &mut Timestamps;

    fn metadata(&self) -> &MetadataMaps;

    fn metadata_mut(&mut self) -> &mut MetadataMaps;

    /// `true` until the record is soft-deleted.
    fn is_active(&self) -> bool {
        self.timestamps().is_active()
    }
}
