//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Master data records (products, warehouses, bin locations, batches) and
/// ledger entries implement this so stores can key them uniformly.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
