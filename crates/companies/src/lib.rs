//! `userverse-companies` — company access control.
//!
//! - [`AccessGate`]: may this caller act on this company (optionally with a role)?
//! - [`MembershipAuthority`]: link/unlink users and list memberships.
//! - [`RoleLifecycle`]: per-company roles, including delete-and-reassign.
//! - [`CompanyService`]: company creation (with default roles and the founding
//!   administrator), lookup, update and closure.
//!
//! Every operation runs inside one store transaction. Permission checks read
//! through that same transaction, so a check and the write it guards see the
//! same state.

pub mod access;
pub mod company;
pub mod membership;
pub mod roles;

pub use access::AccessGate;
pub use company::CompanyService;
pub use membership::MembershipAuthority;
pub use roles::{RoleDeletionOutcome, RoleLifecycle};
