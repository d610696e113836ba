//! Stock domain module.
//!
//! Locations, the atomic stock movement, stock balances, master data and the
//! allocation strategies that turn quantity needs into concrete locations.
//! Everything here is deterministic domain logic (no IO, no storage).

pub mod allocation;
pub mod batch;
pub mod catalog;
pub mod combination;
pub mod location;
pub mod movement;
pub mod quantity;
pub mod stock;

pub use allocation::{
    AllocationError, FifoPickingStrategy, InventorySnapshot, PickingStrategy,
    ProductOrthogonalStockingStrategy, StockShortage, StockingStrategy,
};
pub use batch::{BatchQuantities, BatchQuantity};
pub use catalog::{Batch, BinLocation, Product, Warehouse};
pub use combination::{
    CombinationRule, LocationCombinationViolation, find_location_combination_violations,
};
pub use location::{LocationKind, SpecialLocation, StockLocationReference};
pub use movement::{MAX_MOVEMENT_QUANTITY, MovementError, NewStockMovement, StockMovement};
pub use quantity::{ProductQuantity, ProductQuantityLocation, StockArea};
pub use stock::{LocationSelector, Stock, StockFilter, StockKey};
