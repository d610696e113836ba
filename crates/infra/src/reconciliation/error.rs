use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use stockledger_core::ProductId;
use stockledger_stock::{AllocationError, MovementError, ProductQuantity};

use crate::ledger::LedgerError;
use crate::store::StoreError;
use crate::transaction::TransactionFailure;

/// Quantity reconciliation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Available stock cannot be lowered that far with stock in for-sale warehouses.
    #[error("insufficient stock to lower available stock of {product_ids:?}")]
    InsufficientStock {
        product_ids: Vec<ProductId>,
        shortages: Vec<ProductQuantity>,
    },

    /// A negative total stock target without the negative-stock override.
    /// Unreachable non-negative targets of the same call are listed in
    /// `not_enough_stock`.
    #[error("negative total stock not allowed for {product_ids:?}")]
    NegativeStockNotAllowed {
        product_ids: Vec<ProductId>,
        not_enough_stock: Vec<ProductId>,
    },

    /// A non-negative total stock target that cannot be reached without
    /// driving a location negative.
    #[error("not enough stock to reach the total stock of {product_ids:?}")]
    NotEnoughStock { product_ids: Vec<ProductId> },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    InvalidMovement(#[from] MovementError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("reconciliation failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: StoreError },

    #[error("stock store failure: {0}")]
    Store(#[from] StoreError),
}

impl ReconciliationError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconciliationError::InsufficientStock { .. } => "STOCK_LEDGER__INSUFFICIENT_STOCK",
            ReconciliationError::NegativeStockNotAllowed { .. } => "STOCK_LEDGER__NEGATIVE_STOCK_NOT_ALLOWED",
            ReconciliationError::NotEnoughStock { .. } => "STOCK_LEDGER__NOT_ENOUGH_STOCK",
            ReconciliationError::Allocation(err) => match err {
                AllocationError::StockShortage(_) => "STOCK_LEDGER__STOCK_SHORTAGE",
                AllocationError::NoEligibleLocation { .. } => "STOCK_LEDGER__NO_ELIGIBLE_LOCATION",
                AllocationError::NegativeNeed { .. } => "STOCK_LEDGER__NEGATIVE_NEED",
            },
            ReconciliationError::InvalidMovement(_) => "STOCK_LEDGER__INVALID_MOVEMENT",
            ReconciliationError::Ledger(err) => err.code(),
            ReconciliationError::RetriesExhausted { .. } => "STOCK_LEDGER__TRANSACTION_RETRIES_EXHAUSTED",
            ReconciliationError::Store(_) => "STOCK_LEDGER__STORE_FAILURE",
        }
    }

    pub fn details(&self) -> JsonValue {
        match self {
            ReconciliationError::InsufficientStock { product_ids, shortages } => {
                json!({ "productIds": product_ids, "shortages": shortages })
            }
            ReconciliationError::NegativeStockNotAllowed {
                product_ids,
                not_enough_stock,
            } => json!({ "productIds": product_ids, "notEnoughStockProductIds": not_enough_stock }),
            ReconciliationError::NotEnoughStock { product_ids } => json!({ "productIds": product_ids }),
            ReconciliationError::Allocation(err) => json!(err),
            ReconciliationError::InvalidMovement(err) => json!(err),
            ReconciliationError::Ledger(err) => err.details(),
            ReconciliationError::RetriesExhausted { attempts, .. } => json!({ "attempts": attempts }),
            ReconciliationError::Store(_) => JsonValue::Null,
        }
    }
}

impl TransactionFailure for ReconciliationError {
    fn transient_cause(&self) -> Option<&StoreError> {
        match self {
            ReconciliationError::Store(err) if err.is_transient() => Some(err),
            ReconciliationError::Ledger(err) => err.transient_cause(),
            _ => None,
        }
    }

    fn retries_exhausted(attempts: u32, last_error: StoreError) -> Self {
        ReconciliationError::RetriesExhausted { attempts, last_error }
    }
}
