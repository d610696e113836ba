use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use stockledger_core::ProductId;
use stockledger_stock::{
    LocationKind, NewStockMovement, Product, StockKey, StockMovement, find_location_combination_violations,
};

use crate::config::LedgerConfig;
use crate::store::{CommitReceipt, StockStore, StockTransaction};
use crate::transaction::execute_in_transaction;

use super::error::{LedgerError, NegativeStockViolation};

/// Per-call options of the Ledger Writer.
///
/// Passed explicitly with every call; the negative-stock override of one call
/// never affects another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub allow_negative_stocks: bool,
}

impl ApplyOptions {
    pub fn allowing_negative_stocks() -> Self {
        Self {
            allow_negative_stocks: true,
        }
    }
}

/// The Ledger Writer: the only component that mutates stock rows.
#[derive(Debug)]
pub struct StockMovementService<S> {
    store: S,
    config: LedgerConfig,
}

impl<S> StockMovementService<S>
where
    S: StockStore,
{
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Validate and apply movement descriptors as one atomic batch.
    pub fn create_and_apply(
        &self,
        movements: Vec<NewStockMovement>,
        options: ApplyOptions,
    ) -> Result<CommitReceipt, LedgerError> {
        let movements = movements
            .into_iter()
            .map(StockMovement::create)
            .collect::<Result<Vec<_>, _>>()?;
        self.apply_movements(&movements, options)
    }

    /// Apply movements atomically, retrying transient store conflicts.
    ///
    /// Structural validation happens before a transaction is opened. An empty
    /// batch succeeds without touching the store.
    #[instrument(
        skip(self, movements),
        fields(movements = movements.len(), allow_negative_stocks = options.allow_negative_stocks),
        err
    )]
    pub fn apply_movements(
        &self,
        movements: &[StockMovement],
        options: ApplyOptions,
    ) -> Result<CommitReceipt, LedgerError> {
        if movements.is_empty() {
            return Ok(CommitReceipt::empty());
        }
        ensure_valid_combinations(movements)?;

        let (_, receipt) = execute_in_transaction(&self.store, &self.config.retry, |tx| {
            self.write_movements(tx, movements, options)
        })?;

        info!(
            movements = receipt.movement_ids.len(),
            products = receipt.aggregates.products.len(),
            "stock movements applied"
        );
        Ok(receipt)
    }

    /// Apply movements inside a caller-owned transaction.
    ///
    /// Runs the full write protocol (validation, row locks, insert, aggregate
    /// refresh, negative-stock check) but does not commit, so callers can combine
    /// it with their own reads and locks.
    pub fn write_movements(
        &self,
        tx: &mut dyn StockTransaction,
        movements: &[StockMovement],
        options: ApplyOptions,
    ) -> Result<(), LedgerError> {
        if movements.is_empty() {
            return Ok(());
        }
        ensure_valid_combinations(movements)?;

        let product_ids: Vec<ProductId> = movements
            .iter()
            .map(StockMovement::product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products: BTreeMap<ProductId, Product> = tx
            .products(&product_ids)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let unknown: Vec<ProductId> = product_ids
            .iter()
            .copied()
            .filter(|id| !products.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            return Err(LedgerError::UnknownProduct { product_ids: unknown });
        }

        let unmanaged_into_bins: BTreeSet<ProductId> = movements
            .iter()
            .filter(|m| m.destination().kind() == LocationKind::BinLocation)
            .map(StockMovement::product_id)
            .filter(|id| products.get(id).is_some_and(|p| !p.stock_managed))
            .collect();
        if !unmanaged_into_bins.is_empty() {
            return Err(LedgerError::NonStockManagedProduct {
                product_ids: unmanaged_into_bins.into_iter().collect(),
            });
        }

        let guarded = guarded_stocks(movements, &products, options);
        debug!(guarded = guarded.len(), "locking stock rows");
        tx.lock_stocks(&guarded)?;

        tx.insert_movements(movements)?;
        tx.refresh_aggregates(&product_ids)?;

        let mut violations = Vec::new();
        for key in &guarded {
            let quantity = tx.stock(key)?.map(|s| s.quantity).unwrap_or(0);
            if quantity < 0 {
                violations.push(NegativeStockViolation {
                    product_id: key.product_id,
                    product_number: products
                        .get(&key.product_id)
                        .map(|p| p.product_number.clone())
                        .unwrap_or_default(),
                    location: key.location,
                    location_name: tx.location_name(&key.location)?,
                    quantity,
                });
            }
        }
        if !violations.is_empty() {
            warn!(violations = violations.len(), "rejecting movements that leave negative stock");
            return Err(LedgerError::NegativeStock { violations });
        }

        Ok(())
    }
}

fn ensure_valid_combinations(movements: &[StockMovement]) -> Result<(), LedgerError> {
    let violations = find_location_combination_violations(movements);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::InvalidLocationCombination { violations })
    }
}

/// Stock rows that must not go negative, sorted (the lock order).
///
/// Only internal sources of stock-managed products are guarded; the override
/// guards nothing.
fn guarded_stocks(
    movements: &[StockMovement],
    products: &BTreeMap<ProductId, Product>,
    options: ApplyOptions,
) -> Vec<StockKey> {
    if options.allow_negative_stocks {
        return vec![];
    }
    movements
        .iter()
        .filter(|m| m.source().is_internal())
        .filter(|m| products.get(&m.product_id()).is_some_and(|p| p.stock_managed))
        .map(|m| StockKey::new(m.product_id(), *m.source()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
