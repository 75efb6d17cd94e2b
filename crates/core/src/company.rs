//! Company (tenant) record.

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Timestamps};
use crate::id::CompanyId;
use crate::metadata::{CompanyAddress, MetadataMaps};
use crate::pagination::contains_ci;

/// Persisted company. `email` is unique across companies.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub id: CompanyId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub timestamps: Timestamps,
    pub metadata: MetadataMaps,
}

impl Company {
    /// Address lives in `primary_meta_data.address`.
    pub fn address(&self) -> Option<CompanyAddress> {
        self.metadata.primary().address()
    }

    pub fn view(&self) -> CompanyView {
        CompanyView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            industry: self.industry.clone(),
            email: self.email.clone(),
            phone_number: self.phone_number.clone(),
            address: self.address(),
        }
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> CompanyId {
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

/// Outward representation with the address lifted out of metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyView {
    pub id: CompanyId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<CompanyAddress>,
}

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub phone_number: Option<String>,
}

impl CompanyChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.industry.is_none()
            && self.phone_number.is_none()
    }

    pub fn apply_to(self, company: &mut Company) {
        if let Some(v) = self.name {
            company.name = Some(v);
        }
        if let Some(v) = self.description {
            company.description = Some(v);
        }
        if let Some(v) = self.industry {
            company.industry = Some(v);
        }
        if let Some(v) = self.phone_number {
            company.phone_number = Some(v);
        }
    }
}

/// Substring filters on company attributes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
}

impl CompanyFilter {
    pub fn matches(&self, company: &Company) -> bool {
        contains_ci(company.name.as_deref(), self.name.as_deref())
            && contains_ci(company.description.as_deref(), self.description.as_deref())
            && contains_ci(company.industry.as_deref(), self.industry.as_deref())
            && contains_ci(Some(&company.email), self.email.as_deref())
    }
}
