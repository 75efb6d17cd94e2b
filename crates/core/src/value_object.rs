//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity of their own: two addresses with the same
/// fields are the same address. Records such as `User` or `Company` are
/// entities instead (see [`crate::Entity`]); the snapshots and sub-documents
/// stored in their metadata maps are value objects.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
