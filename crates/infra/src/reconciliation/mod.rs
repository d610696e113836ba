//! Quantity reconciliation writers.
//!
//! Given a desired quantity per product, compute the delta against the current
//! figure, turn it into movements with a stocking or picking strategy, and apply
//! them through the Ledger Writer in one transaction that holds the product locks.
//!
//! - [`AvailableStockWriter`]: targets available stock, restricted to for-sale warehouses.
//! - [`TotalStockWriter`]: targets physical stock across every internal location.

pub mod available_stock;
pub mod error;
pub mod total_stock;

use std::collections::BTreeMap;

use stockledger_core::{ProductId, WarehouseId};
use stockledger_stock::{
    InventorySnapshot, MAX_MOVEMENT_QUANTITY, MovementError, Product, ProductQuantity, StockFilter, Warehouse,
};

use crate::ledger::LedgerError;
use crate::projections::{ProductStockSummary, product_stock_summary};
use crate::store::StockTransaction;

pub use available_stock::AvailableStockWriter;
pub use error::ReconciliationError;
pub use total_stock::TotalStockWriter;

/// Everything a reconciliation reads, loaded after the product locks are held.
struct ReconciliationContext {
    products: BTreeMap<ProductId, Product>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    inventory: InventorySnapshot,
}

impl ReconciliationContext {
    fn load(tx: &mut dyn StockTransaction, product_ids: &[ProductId]) -> Result<Self, ReconciliationError> {
        tx.lock_products(product_ids)?;

        let products: BTreeMap<ProductId, Product> = tx
            .products(product_ids)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let unknown: Vec<ProductId> = product_ids
            .iter()
            .copied()
            .filter(|id| !products.contains_key(id))
            .collect();
        if !unknown.is_empty() {
            return Err(LedgerError::UnknownProduct { product_ids: unknown }.into());
        }

        let warehouses = tx.warehouses()?;
        let stocks = tx.stocks(&StockFilter::for_products(product_ids.iter().copied()))?;
        let inventory = InventorySnapshot::new(warehouses.clone(), products.values().cloned(), stocks);

        Ok(Self {
            products,
            warehouses: warehouses.into_iter().map(|w| (w.id, w)).collect(),
            inventory,
        })
    }

    fn summary(&self, product_id: ProductId) -> Option<ProductStockSummary> {
        self.products
            .get(&product_id)
            .map(|p| product_stock_summary(p, self.inventory.stocks_of(product_id), &self.warehouses))
    }

    /// Split `target - current` per product into increases and decreases
    /// (both positive quantities).
    ///
    /// A delta that overflows or exceeds what one movement may carry is
    /// rejected as an invalid movement for that product.
    fn deltas(
        &self,
        targets: &BTreeMap<ProductId, i64>,
        current: impl Fn(&ProductStockSummary) -> i64,
    ) -> Result<(Vec<ProductQuantity>, Vec<ProductQuantity>), ReconciliationError> {
        let mut increases = Vec::new();
        let mut decreases = Vec::new();
        for (product_id, target) in targets {
            let Some(summary) = self.summary(*product_id) else {
                continue;
            };
            let delta = target
                .checked_sub(current(&summary))
                .filter(|delta| delta.unsigned_abs() <= MAX_MOVEMENT_QUANTITY as u64)
                .ok_or(MovementError::QuantityOutOfRange {
                    product_id: *product_id,
                    quantity: *target,
                    max: MAX_MOVEMENT_QUANTITY,
                })?;
            if delta > 0 {
                increases.push(ProductQuantity::new(*product_id, delta));
            } else if delta < 0 {
                decreases.push(ProductQuantity::new(*product_id, -delta));
            }
        }
        Ok((increases, decreases))
    }
}

fn sorted_product_ids(targets: &BTreeMap<ProductId, i64>) -> Vec<ProductId> {
    targets.keys().copied().collect()
}

/// Product ids named by a ledger negative-stock failure.
fn negative_stock_products(err: &LedgerError) -> Option<Vec<ProductId>> {
    match err {
        LedgerError::NegativeStock { violations } => {
            let mut ids: Vec<ProductId> = violations.iter().map(|v| v.product_id).collect();
            ids.sort();
            ids.dedup();
            Some(ids)
        }
        _ => None,
    }
}
