use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use stockledger_core::ProductId;
use stockledger_stock::{
    AllocationError, FifoPickingStrategy, PickingStrategy, ProductOrthogonalStockingStrategy,
    ProductQuantityLocation, SpecialLocation, StockArea, StockLocationReference, StockMovement,
    StockingStrategy,
};

use crate::ledger::{ApplyOptions, LedgerError, StockMovementService};
use crate::store::{CommitReceipt, StockStore, StockTransaction};
use crate::transaction::execute_in_transaction;

use super::{ReconciliationContext, ReconciliationError, negative_stock_products, sorted_product_ids};

/// Sets physical stock across every internal location (absolute correction).
///
/// A picking shortage does not fail outright: the shortfall is drawn from the
/// top-priority warehouse's own location. The Ledger Writer's negative-stock
/// check still applies there unless overridden.
pub struct TotalStockWriter<S> {
    ledger: Arc<StockMovementService<S>>,
    stocking: Arc<dyn StockingStrategy>,
    picking: Arc<dyn PickingStrategy>,
}

impl<S> TotalStockWriter<S>
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
    pub fn set_total_stocks(
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

        info!(movements, "total stock reconciled");
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
        let (increases, decreases) = context.deltas(targets, |summary| summary.physical_stock)?;

        let everywhere = StockArea::everywhere();
        let change = StockLocationReference::special(SpecialLocation::ProductTotalStockChange);

        let mut movements = Vec::new();
        if !increases.is_empty() {
            let solution = self
                .stocking
                .calculate_stocking_solution(&increases, &everywhere, &context.inventory)?;
            for placement in &solution {
                movements.push(StockMovement::create(placement.movement_from(change))?);
            }
        }
        if !decreases.is_empty() {
            let solution = match self
                .picking
                .calculate_picking_solution(&decreases, &everywhere, &context.inventory)
            {
                Ok(solution) => solution,
                Err(AllocationError::StockShortage(shortage)) => {
                    let Some(fallback) = context.inventory.warehouses().first() else {
                        return Err(AllocationError::NoEligibleLocation {
                            product_ids: shortage.product_ids(),
                        }
                        .into());
                    };
                    let fallback = StockLocationReference::warehouse(fallback.id);
                    warn!(
                        products = shortage.shortages.len(),
                        fallback = %fallback,
                        "drawing total stock shortfall from fallback location"
                    );

                    let mut solution = shortage.partial_solution;
                    solution.extend(
                        shortage
                            .shortages
                            .iter()
                            .map(|missing| ProductQuantityLocation::new(fallback, missing.product_id, missing.quantity)),
                    );
                    solution
                }
                Err(other) => return Err(other.into()),
            };
            for pick in &solution {
                movements.push(StockMovement::create(pick.movement_to(change))?);
            }
        }

        self.ledger
            .write_movements(tx, &movements, options)
            .map_err(|err| classify_negative_stock(err, targets))?;
        Ok(movements.len())
    }
}

/// Distinguish a negative target from an unreachable non-negative one.
///
/// Negative targets take precedence; products whose non-negative target is
/// unreachable in the same call are carried along in `not_enough_stock`.
fn classify_negative_stock(err: LedgerError, targets: &BTreeMap<ProductId, i64>) -> ReconciliationError {
    let Some(product_ids) = negative_stock_products(&err) else {
        return err.into();
    };
    let (negative_targets, others): (Vec<ProductId>, Vec<ProductId>) = product_ids
        .into_iter()
        .partition(|id| targets.get(id).is_some_and(|target| *target < 0));

    if !negative_targets.is_empty() {
        ReconciliationError::NegativeStockNotAllowed {
            product_ids: negative_targets,
            not_enough_stock: others,
        }
    } else {
        ReconciliationError::NotEnoughStock { product_ids: others }
    }
}
