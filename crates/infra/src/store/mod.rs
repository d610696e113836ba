//! Transactional stock store boundary.
//!
//! Stock rows and derived aggregates are written only through a
//! `StockTransaction`; the in-memory backend serves tests and development.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use r#trait::{CommitReceipt, StockReader, StockStore, StockTransaction, StoreError};
