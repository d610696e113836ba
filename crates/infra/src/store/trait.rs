use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use stockledger_core::{ProductId, StockMovementId};
use stockledger_stock::{Product, Stock, StockFilter, StockKey, StockLocationReference, StockMovement, Warehouse};

use crate::projections::AggregateSnapshot;

/// Stock store operation error.
///
/// These are **infrastructure errors** (contention, storage) as opposed to domain
/// errors. `SerializationFailure` and `Deadlock` are transient: the whole unit of
/// work may be replayed in a fresh transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    #[error("deadlock detected: {0}")]
    Deadlock(String),

    #[error("lock wait timeout: {0}")]
    LockTimeout(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether replaying the transaction may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::SerializationFailure(_) | StoreError::Deadlock(_) | StoreError::LockTimeout(_)
        )
    }
}

/// What a successful commit made durable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub movement_ids: Vec<StockMovementId>,
    pub aggregates: AggregateSnapshot,
}

impl CommitReceipt {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Read access to master data and stock rows.
///
/// Inside a transaction, reads observe the transaction's own uncommitted writes.
pub trait StockReader {
    /// Products with the given ids. Unknown ids are omitted.
    fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    fn warehouses(&self) -> Result<Vec<Warehouse>, StoreError>;

    fn stocks(&self, filter: &StockFilter) -> Result<Vec<Stock>, StoreError>;

    fn stock(&self, key: &StockKey) -> Result<Option<Stock>, StoreError>;

    /// Display name of a location (warehouse code, bin code, ...), if known.
    fn location_name(&self, location: &StockLocationReference) -> Result<Option<String>, StoreError>;
}

/// One unit of work against the store.
///
/// Locks are held until the transaction commits or is dropped. Dropping an
/// uncommitted transaction rolls it back.
pub trait StockTransaction: StockReader {
    /// Exclusive locks on product rows (serializes reconciliation per product).
    fn lock_products(&mut self, product_ids: &[ProductId]) -> Result<(), StoreError>;

    /// Exclusive locks on stock rows. Rows that do not exist yet are locked too,
    /// so concurrent first writers serialize as well.
    fn lock_stocks(&mut self, keys: &[StockKey]) -> Result<(), StoreError>;

    /// Append movements to the ledger and apply them to the affected stock rows.
    fn insert_movements(&mut self, movements: &[StockMovement]) -> Result<(), StoreError>;

    /// Recompute derived aggregates for the given products, as seen by this
    /// transaction. The products are refreshed again at commit.
    fn refresh_aggregates(&mut self, product_ids: &[ProductId]) -> Result<AggregateSnapshot, StoreError>;

    fn commit(self: Box<Self>) -> Result<CommitReceipt, StoreError>;
}

/// Transactional stock store shared by all request handlers.
pub trait StockStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn StockTransaction + '_>, StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn begin(&self) -> Result<Box<dyn StockTransaction + '_>, StoreError> {
        (**self).begin()
    }
}
