use tracing::debug;

use crate::batch::BatchQuantities;
use crate::location::{LocationKind, StockLocationReference};
use crate::quantity::{ProductQuantity, ProductQuantityLocation, StockArea};
use crate::stock::Stock;

use super::error::{AllocationError, StockShortage};
use super::snapshot::InventorySnapshot;
use super::{PickingStrategy, normalize_needs};

/// Greedy picking over a deterministic row order.
///
/// Candidate rows (positive quantity, inside the area) are visited by:
/// 1. warehouse priority (default, oldest, id; unowned rows last)
/// 2. location kind: bin locations, warehouse-level stock, containers, goods receipts
/// 3. row creation sequence (FIFO)
/// 4. location key
///
/// For batch-managed products the batch-tracked portion of a row is consumed
/// first, batches in stored (earliest-created) order, then the untracked
/// remainder. The two portions are emitted as separate entries so each entry's
/// batch subset totals its quantity. Other products are picked without batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct FifoPickingStrategy;

fn kind_rank(location: &StockLocationReference) -> u8 {
    match location.kind() {
        LocationKind::BinLocation => 0,
        LocationKind::Warehouse => 1,
        LocationKind::StockContainer => 2,
        LocationKind::GoodsReceipt => 3,
        LocationKind::Order | LocationKind::ReturnOrder | LocationKind::SpecialLocation => u8::MAX,
    }
}

fn pick_from_row(
    row: &Stock,
    quantity: i64,
    batch_managed: bool,
    solution: &mut Vec<ProductQuantityLocation>,
) -> i64 {
    let take = quantity.min(row.quantity);
    if take <= 0 {
        return 0;
    }

    let tracked = if batch_managed {
        row.batches.take_in_order(take)
    } else {
        BatchQuantities::new()
    };
    let tracked_quantity = tracked.total();
    if tracked_quantity > 0 {
        solution.push(
            ProductQuantityLocation::new(row.location, row.product_id, tracked_quantity)
                .with_batches(tracked),
        );
    }

    let untracked_quantity = take - tracked_quantity;
    if untracked_quantity > 0 {
        solution.push(ProductQuantityLocation::new(
            row.location,
            row.product_id,
            untracked_quantity,
        ));
    }

    take
}

impl PickingStrategy for FifoPickingStrategy {
    fn calculate_picking_solution(
        &self,
        needs: &[ProductQuantity],
        area: &StockArea,
        inventory: &InventorySnapshot,
    ) -> Result<Vec<ProductQuantityLocation>, AllocationError> {
        let needs = normalize_needs(needs)?;
        let mut solution = Vec::new();
        let mut shortages = Vec::new();

        for need in needs {
            let batch_managed = inventory
                .product(need.product_id)
                .is_some_and(|product| product.batch_managed);
            let mut candidates: Vec<&Stock> = inventory
                .stocks_of(need.product_id)
                .iter()
                .filter(|s| s.quantity > 0 && area.contains(s))
                .collect();
            candidates.sort_by_key(|s| {
                (
                    inventory.warehouse_rank(s.warehouse_id),
                    kind_rank(&s.location),
                    s.sequence,
                    s.location,
                )
            });

            let mut remaining = need.quantity;
            for row in candidates {
                if remaining == 0 {
                    break;
                }
                remaining -= pick_from_row(row, remaining, batch_managed, &mut solution);
            }

            if remaining > 0 {
                debug!(
                    product_id = %need.product_id,
                    requested = need.quantity,
                    missing = remaining,
                    "picking shortage"
                );
                shortages.push(ProductQuantity::new(need.product_id, remaining));
            }
        }

        if !shortages.is_empty() {
            return Err(AllocationError::StockShortage(StockShortage {
                partial_solution: solution,
                shortages,
            }));
        }

        Ok(solution)
    }
}
