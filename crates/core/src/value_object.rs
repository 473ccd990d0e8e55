//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two batches with the same expiry and quantity
/// are the same batch. They are cheap to clone and compared by their attributes.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
