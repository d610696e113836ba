//! Infrastructure layer: stock store, transactions, Ledger Writer, reconciliation.
//!
//! Everything that reads or mutates stock rows goes through a [`store::StockStore`]
//! transaction. The [`ledger::StockMovementService`] is the only writer of stock
//! rows and derived aggregates; the reconciliation writers and the
//! [`engine::StockEngine`] facade build on it.

pub mod config;
pub mod engine;
pub mod ledger;
pub mod projections;
pub mod reconciliation;
pub mod store;
pub mod transaction;

mod integration_tests;

pub use config::LedgerConfig;
pub use engine::{
    EngineError, ErrorReport, MovementReceipt, MovementSubmission, ReconciliationMode, ReconciliationRequest,
    StockEngine,
};
pub use ledger::{ApplyOptions, LedgerError, NegativeStockViolation, StockMovementService};
pub use reconciliation::{AvailableStockWriter, ReconciliationError, TotalStockWriter};
pub use store::{CommitReceipt, InMemoryStockStore, StockReader, StockStore, StockTransaction, StoreError};
pub use transaction::{RetryPolicy, TransactionFailure, execute_in_transaction};
