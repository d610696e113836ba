//! Allocation strategies: turn "N more / fewer units of product P" into concrete
//! location-quantity pairs.
//!
//! Strategies are pure functions over an [`InventorySnapshot`] loaded by the caller
//! inside its transaction; they never touch storage themselves.

pub mod error;
pub mod picking;
pub mod snapshot;
pub mod stocking;

pub use error::{AllocationError, StockShortage};
pub use picking::FifoPickingStrategy;
pub use snapshot::InventorySnapshot;
pub use stocking::ProductOrthogonalStockingStrategy;

use crate::quantity::{ProductQuantity, ProductQuantityLocation, StockArea};

/// Decides where incoming stock is placed.
pub trait StockingStrategy: Send + Sync {
    fn calculate_stocking_solution(
        &self,
        needs: &[ProductQuantity],
        area: &StockArea,
        inventory: &InventorySnapshot,
    ) -> Result<Vec<ProductQuantityLocation>, AllocationError>;
}

/// Decides which existing stock satisfies an outgoing need.
///
/// When the need cannot be met in full, implementations fail with
/// [`AllocationError::StockShortage`] carrying the partial solution.
pub trait PickingStrategy: Send + Sync {
    fn calculate_picking_solution(
        &self,
        needs: &[ProductQuantity],
        area: &StockArea,
        inventory: &InventorySnapshot,
    ) -> Result<Vec<ProductQuantityLocation>, AllocationError>;
}

/// Merge needs per product, dropping zeroes and rejecting negative quantities.
pub(crate) fn normalize_needs(needs: &[ProductQuantity]) -> Result<Vec<ProductQuantity>, AllocationError> {
    let merged = ProductQuantity::merge(needs.iter().copied());
    if let Some(negative) = merged.iter().find(|pq| pq.quantity < 0) {
        return Err(AllocationError::NegativeNeed {
            product_id: negative.product_id,
            quantity: negative.quantity,
        });
    }
    Ok(merged.into_iter().filter(|pq| pq.quantity > 0).collect())
}
