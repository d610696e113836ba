use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use stockledger_core::ProductId;
use stockledger_stock::{
    AllocationError, FifoPickingStrategy, PickingStrategy, ProductOrthogonalStockingStrategy, SpecialLocation,
    StockArea, StockLocationReference, StockMovement, StockingStrategy,
};

use crate::ledger::{ApplyOptions, StockMovementService};
use crate::store::{CommitReceipt, StockStore, StockTransaction};
use crate::transaction::execute_in_transaction;

use super::{ReconciliationContext, ReconciliationError, sorted_product_ids};

/// Sets available stock (physical - reserved - not available for sale).
///
/// Only warehouses flagged as for-sale are touched: increases are stocked into
/// the top-priority for-sale warehouse, decreases are picked from all of them.
pub struct AvailableStockWriter<S> {
    ledger: Arc<StockMovementService<S>>,
    stocking: Arc<dyn StockingStrategy>,
    picking: Arc<dyn PickingStrategy>,
}

impl<S> AvailableStockWriter<S>
where
    S: StockStore,
{
    pub fn new(ledger: Arc<StockMovementService<S>>) -> Self {
        Self::with_strategies(
            ledger,
            Arc::new(ProductOrthogonalStockingStrategy),
            Arc::new(FifoPickingStrategy),
        )
    }

    pub fn with_strategies(
        ledger: Arc<StockMovementService<S>>,
        stocking: Arc<dyn StockingStrategy>,
        picking: Arc<dyn PickingStrategy>,
    ) -> Self {
        Self {
            ledger,
            stocking,
            picking,
        }
    }

    #[instrument(skip(self, targets), fields(products = targets.len()), err)]
    pub fn set_available_stocks(
        &self,
        targets: &BTreeMap<ProductId, i64>,
        options: ApplyOptions,
    ) -> Result<CommitReceipt, ReconciliationError> {
        if targets.is_empty() {
            return Ok(CommitReceipt::empty());
        }
        let product_ids = sorted_product_ids(targets);

        let (movements, receipt) = execute_in_transaction(self.ledger.store(), &self.ledger.config().retry, |tx| {
            self.reconcile(tx, &product_ids, targets, options)
        })?;

        info!(movements, "available stock reconciled");
        Ok(receipt)
    }

    fn reconcile(
        &self,
        tx: &mut dyn StockTransaction,
        product_ids: &[ProductId],
        targets: &BTreeMap<ProductId, i64>,
        options: ApplyOptions,
    ) -> Result<usize, ReconciliationError> {
        let context = ReconciliationContext::load(tx, product_ids)?;
        let (increases, decreases) = context.deltas(targets, |summary| summary.available_stock)?;

        let for_sale = StockArea::warehouses(
            context
                .warehouses
                .values()
                .filter(|w| w.is_stock_available_for_sale)
                .map(|w| w.id),
        );
        let change = StockLocationReference::special(SpecialLocation::ProductAvailableStockChange);

        let mut movements = Vec::new();
        if !increases.is_empty() {
            let solution = self
                .stocking
                .calculate_stocking_solution(&increases, &for_sale, &context.inventory)?;
            for placement in &solution {
                movements.push(StockMovement::create(placement.movement_from(change))?);
            }
        }
        if !decreases.is_empty() {
            let solution = self
                .picking
                .calculate_picking_solution(&decreases, &for_sale, &context.inventory)
                .map_err(|err| match err {
                    AllocationError::StockShortage(shortage) => ReconciliationError::InsufficientStock {
                        product_ids: shortage.product_ids(),
                        shortages: shortage.shortages,
                    },
                    other => ReconciliationError::Allocation(other),
                })?;
            for pick in &solution {
                movements.push(StockMovement::create(pick.movement_to(change))?);
            }
        }

        self.ledger.write_movements(tx, &movements, options)?;
        Ok(movements.len())
    }
}
