//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly typed identifiers, the domain error model and marker traits.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    BatchId, BinLocationId, GoodsReceiptId, OrderId, ProcessId, ProductId, ReturnOrderId,
    StockContainerId, StockMovementId, UserId, VersionId, WarehouseId,
};
pub use value_object::ValueObject;
