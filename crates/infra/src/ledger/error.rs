use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;

use stockledger_core::ProductId;
use stockledger_stock::{LocationCombinationViolation, MovementError, StockLocationReference};

use crate::store::StoreError;
use crate::transaction::TransactionFailure;

/// A (product, location) balance that would end up below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeStockViolation {
    pub product_id: ProductId,
    pub product_number: String,
    pub location: StockLocationReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub quantity: i64,
}

/// Ledger Writer failure.
///
/// Validation variants are raised before any lock is taken and never retried.
/// `NegativeStock` is raised after the movements were tentatively applied; the
/// transaction is rolled back in full.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid movement: {0}")]
    InvalidMovement(#[from] MovementError),

    #[error("{} movement(s) use a disallowed source/destination combination", violations.len())]
    InvalidLocationCombination {
        violations: Vec<LocationCombinationViolation>,
    },

    #[error("unknown products {product_ids:?}")]
    UnknownProduct { product_ids: Vec<ProductId> },

    #[error("products {product_ids:?} are not stock managed and cannot be moved into bin locations")]
    NonStockManagedProduct { product_ids: Vec<ProductId> },

    #[error("movements would leave {} stock(s) negative", violations.len())]
    NegativeStock {
        violations: Vec<NegativeStockViolation>,
    },

    #[error("transaction failed after {attempts} attempt(s): {last_error}")]
    RetriesExhausted { attempts: u32, last_error: StoreError },

    #[error("stock store failure: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidMovement(_) => "STOCK_LEDGER__INVALID_MOVEMENT",
            LedgerError::InvalidLocationCombination { .. } => "STOCK_LEDGER__INVALID_LOCATION_COMBINATION",
            LedgerError::UnknownProduct { .. } => "STOCK_LEDGER__UNKNOWN_PRODUCT",
            LedgerError::NonStockManagedProduct { .. } => "STOCK_LEDGER__NON_STOCK_MANAGED_PRODUCT",
            LedgerError::NegativeStock { .. } => "STOCK_LEDGER__NEGATIVE_STOCK",
            LedgerError::RetriesExhausted { .. } => "STOCK_LEDGER__TRANSACTION_RETRIES_EXHAUSTED",
            LedgerError::Store(_) => "STOCK_LEDGER__STORE_FAILURE",
        }
    }

    /// Identifiers a presentation layer needs to render the error.
    pub fn details(&self) -> JsonValue {
        match self {
            LedgerError::InvalidMovement(err) => json!(err),
            LedgerError::InvalidLocationCombination { violations } => json!({ "violations": violations }),
            LedgerError::UnknownProduct { product_ids } | LedgerError::NonStockManagedProduct { product_ids } => {
                json!({ "productIds": product_ids })
            }
            LedgerError::NegativeStock { violations } => json!({ "violations": violations }),
            LedgerError::RetriesExhausted { attempts, .. } => json!({ "attempts": attempts }),
            LedgerError::Store(_) => JsonValue::Null,
        }
    }

    /// Products named by the error, if any.
    pub fn product_ids(&self) -> Vec<ProductId> {
        match self {
            LedgerError::InvalidMovement(err) => vec![err.product_id()],
            LedgerError::InvalidLocationCombination { violations } => {
                violations.iter().map(|v| v.product_id).collect()
            }
            LedgerError::UnknownProduct { product_ids } | LedgerError::NonStockManagedProduct { product_ids } => {
                product_ids.clone()
            }
            LedgerError::NegativeStock { violations } => violations.iter().map(|v| v.product_id).collect(),
            LedgerError::RetriesExhausted { .. } | LedgerError::Store(_) => vec![],
        }
    }
}

impl TransactionFailure for LedgerError {
    fn transient_cause(&self) -> Option<&StoreError> {
        match self {
            LedgerError::Store(err) if err.is_transient() => Some(err),
            _ => None,
        }
    }

    fn retries_exhausted(attempts: u32, last_error: StoreError) -> Self {
        LedgerError::RetriesExhausted { attempts, last_error }
    }
}
