use tracing::debug;

use stockledger_core::ProductId;

use crate::location::StockLocationReference;
use crate::quantity::{ProductQuantity, ProductQuantityLocation, StockArea};

use super::error::AllocationError;
use super::snapshot::InventorySnapshot;
use super::{StockingStrategy, normalize_needs};

/// Places each product's whole incoming quantity in one location.
///
/// The location is the top-priority eligible warehouse (default first, then
/// oldest); within it, the product's default bin location if one is configured,
/// otherwise the warehouse itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductOrthogonalStockingStrategy;

impl StockingStrategy for ProductOrthogonalStockingStrategy {
    fn calculate_stocking_solution(
        &self,
        needs: &[ProductQuantity],
        area: &StockArea,
        inventory: &InventorySnapshot,
    ) -> Result<Vec<ProductQuantityLocation>, AllocationError> {
        let needs = normalize_needs(needs)?;
        if needs.is_empty() {
            return Ok(vec![]);
        }

        let Some(warehouse) = inventory.warehouses_in(area).next() else {
            let product_ids: Vec<ProductId> = needs.iter().map(|pq| pq.product_id).collect();
            return Err(AllocationError::NoEligibleLocation { product_ids });
        };

        let solution = needs
            .into_iter()
            .map(|need| {
                let location = match inventory.default_bin_location(need.product_id, warehouse.id) {
                    Some(bin) => StockLocationReference::bin_location(bin),
                    None => StockLocationReference::warehouse(warehouse.id),
                };
                debug!(
                    product_id = %need.product_id,
                    quantity = need.quantity,
                    location = %location,
                    "stocking solution"
                );
                ProductQuantityLocation::new(location, need.product_id, need.quantity)
            })
            .collect();

        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Product, Warehouse};
    use chrono::{Duration, Utc};
    use stockledger_core::{BinLocationId, WarehouseId};

    fn warehouses() -> (Warehouse, Warehouse, Warehouse) {
        let now = Utc::now();
        let old = Warehouse::new(WarehouseId::new(), "old", now - Duration::days(30));
        let default = Warehouse::new(WarehouseId::new(), "main", now).as_default();
        let young = Warehouse::new(WarehouseId::new(), "young", now - Duration::days(1));
        (old, default, young)
    }

    #[test]
    fn places_everything_in_default_warehouse() {
        let (old, default, young) = warehouses();
        let product = ProductId::new();
        let inventory = InventorySnapshot::new(
            vec![old, default.clone(), young],
            [Product::new(product, "P-1")],
            [],
        );

        let solution = ProductOrthogonalStockingStrategy
            .calculate_stocking_solution(
                &[ProductQuantity::new(product, 5), ProductQuantity::new(product, 3)],
                &StockArea::everywhere(),
                &inventory,
            )
            .unwrap();

        assert_eq!(
            solution,
            vec![ProductQuantityLocation::new(
                StockLocationReference::warehouse(default.id),
                product,
                8
            )]
        );
    }

    #[test]
    fn restricted_area_falls_back_to_oldest_eligible_warehouse() {
        let (old, default, young) = warehouses();
        let product = ProductId::new();
        let area = StockArea::warehouses([old.id, young.id]);
        let inventory = InventorySnapshot::new(vec![young, default, old.clone()], [], []);

        let solution = ProductOrthogonalStockingStrategy
            .calculate_stocking_solution(&[ProductQuantity::new(product, 1)], &area, &inventory)
            .unwrap();

        assert_eq!(solution[0].location, StockLocationReference::warehouse(old.id));
    }

    #[test]
    fn prefers_default_bin_location() {
        let (_, default, _) = warehouses();
        let bin = BinLocationId::new();
        let product = ProductId::new();
        let inventory = InventorySnapshot::new(
            vec![default.clone()],
            [Product::new(product, "P-1").with_default_bin_location(default.id, bin)],
            [],
        );

        let solution = ProductOrthogonalStockingStrategy
            .calculate_stocking_solution(
                &[ProductQuantity::new(product, 2)],
                &StockArea::everywhere(),
                &inventory,
            )
            .unwrap();

        assert_eq!(solution[0].location, StockLocationReference::bin_location(bin));
    }

    #[test]
    fn no_eligible_warehouse_fails() {
        let (old, _, _) = warehouses();
        let product = ProductId::new();
        let inventory = InventorySnapshot::new(vec![old], [], []);

        let err = ProductOrthogonalStockingStrategy
            .calculate_stocking_solution(
                &[ProductQuantity::new(product, 2)],
                &StockArea::warehouse(WarehouseId::new()),
                &inventory,
            )
            .unwrap_err();

        assert_eq!(err, AllocationError::NoEligibleLocation { product_ids: vec![product] });
    }

    #[test]
    fn zero_needs_produce_empty_solution() {
        let inventory = InventorySnapshot::default();
        let solution = ProductOrthogonalStockingStrategy
            .calculate_stocking_solution(
                &[ProductQuantity::new(ProductId::new(), 0)],
                &StockArea::everywhere(),
                &inventory,
            )
            .unwrap();
        assert!(solution.is_empty());
    }
}
