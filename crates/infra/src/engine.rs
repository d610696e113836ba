//! Inbound/outbound boundary of the stock engine.
//!
//! Collaborators submit movement descriptors or reconciliation requests (typed
//! or as JSON) and get back the applied movement ids plus the refreshed
//! aggregates, or a structured error report carrying a stable code and the ids
//! needed to render a localized message.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;

use stockledger_core::{ProductId, StockMovementId};
use stockledger_stock::NewStockMovement;

use crate::config::LedgerConfig;
use crate::ledger::{ApplyOptions, LedgerError, StockMovementService};
use crate::projections::AggregateSnapshot;
use crate::reconciliation::{AvailableStockWriter, ReconciliationError, TotalStockWriter};
use crate::store::{CommitReceipt, StockStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSubmission {
    pub movements: Vec<NewStockMovement>,
    #[serde(default)]
    pub allow_negative_stocks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationMode {
    Available,
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRequest {
    pub mode: ReconciliationMode,
    pub quantities: BTreeMap<ProductId, i64>,
    #[serde(default)]
    pub allow_negative_stocks: bool,
}

/// Outcome of a successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub movement_ids: Vec<StockMovementId>,
    pub aggregates: AggregateSnapshot,
}

impl From<CommitReceipt> for MovementReceipt {
    fn from(receipt: CommitReceipt) -> Self {
        Self {
            movement_ids: receipt.movement_ids,
            aggregates: receipt.aggregates,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
}

/// Machine-readable error payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub details: JsonValue,
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Decode(_) => "STOCK_LEDGER__MALFORMED_REQUEST",
            EngineError::Ledger(err) => err.code(),
            EngineError::Reconciliation(err) => err.code(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        let details = match self {
            EngineError::Decode(err) => serde_json::json!({ "line": err.line(), "column": err.column() }),
            EngineError::Ledger(err) => err.details(),
            EngineError::Reconciliation(err) => err.details(),
        };
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            details,
        }
    }
}

/// The engine facade wiring the Ledger Writer and both reconciliation writers
/// onto one store.
pub struct StockEngine<S> {
    ledger: Arc<StockMovementService<S>>,
    available: AvailableStockWriter<S>,
    total: TotalStockWriter<S>,
}

impl<S> StockEngine<S>
where
    S: StockStore,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        let ledger = Arc::new(StockMovementService::new(store, config));
        Self {
            available: AvailableStockWriter::new(Arc::clone(&ledger)),
            total: TotalStockWriter::new(Arc::clone(&ledger)),
            ledger,
        }
    }

    pub fn ledger(&self) -> &StockMovementService<S> {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        self.ledger.store()
    }

    #[instrument(skip(self, submission), fields(movements = submission.movements.len()), err)]
    pub fn submit_movements(&self, submission: MovementSubmission) -> Result<MovementReceipt, EngineError> {
        let options = ApplyOptions {
            allow_negative_stocks: submission.allow_negative_stocks,
        };
        let receipt = self.ledger.create_and_apply(submission.movements, options)?;
        Ok(receipt.into())
    }

    pub fn submit_movements_json(&self, payload: &str) -> Result<MovementReceipt, EngineError> {
        let submission: MovementSubmission = serde_json::from_str(payload)?;
        self.submit_movements(submission)
    }

    #[instrument(skip(self, request), fields(mode = ?request.mode, products = request.quantities.len()), err)]
    pub fn reconcile(&self, request: ReconciliationRequest) -> Result<MovementReceipt, EngineError> {
        let options = ApplyOptions {
            allow_negative_stocks: request.allow_negative_stocks,
        };
        let receipt = match request.mode {
            ReconciliationMode::Available => self.available.set_available_stocks(&request.quantities, options)?,
            ReconciliationMode::Total => self.total.set_total_stocks(&request.quantities, options)?,
        };
        Ok(receipt.into())
    }

    pub fn reconcile_json(&self, payload: &str) -> Result<MovementReceipt, EngineError> {
        let request: ReconciliationRequest = serde_json::from_str(payload)?;
        self.reconcile(request)
    }
}
