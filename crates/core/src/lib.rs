//! `userverse-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, the record types persisted by the entity
//! store, typed metadata and pagination.

pub mod company;
pub mod entity;
pub mod error;
pub mod id;
pub mod membership;
pub mod metadata;
pub mod pagination;
pub mod role;
pub mod user;
pub mod value_object;

pub use company::{Company, CompanyChanges, CompanyFilter, CompanyView, NewCompany};
pub use entity::{Entity, Timestamps};
pub use error::{DomainError, DomainResult};
pub use id::{CompanyId, MembershipId, UserId};
pub use membership::{
    CompanyMember, MemberFilter, Membership, NewMembership, UserCompany, UserCompanyFilter,
};
pub use metadata::{
    ActorSnapshot, CompanyAddress, Metadata, MetadataEntry, MetadataField, MetadataMaps,
    PasswordResetTicket,
};
pub use pagination::{Paginated, Pagination, PaginationMeta};
pub use role::{
    DefaultRole, NewRole, Role, RoleChanges, RoleDeletion, RoleFilter, RoleKey, RoleView,
};
pub use user::{NewUser, User, UserChanges, UserFilter, UserProfile};
pub use value_object::ValueObject;
