//! Stock Ledger Writer.
//!
//! Applies batches of movements atomically: structural validation, row locks on
//! guarded sources, ledger insert, aggregate refresh and the negative-stock
//! post-check all run in one retryable transaction.

pub mod error;
pub mod writer;

pub use error::{LedgerError, NegativeStockViolation};
pub use writer::{ApplyOptions, StockMovementService};
