//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** - two value
/// objects with the same attribute values are the same value. To "modify"
/// one, create a new one. `TrackingNumber` and the product snapshot are the
/// canonical examples here; `Cart` (identity, mutable state) is not.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
