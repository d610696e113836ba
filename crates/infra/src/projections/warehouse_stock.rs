use std::collections::BTreeMap;

use serde::Serialize;

use stockledger_core::{ProductId, WarehouseId};
use stockledger_stock::Stock;

/// Stock of a product inside one warehouse (warehouse-level stock plus every
/// internal location the warehouse owns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseStock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

pub fn warehouse_stocks(product_id: ProductId, stocks: &[Stock]) -> Vec<WarehouseStock> {
    let mut per_warehouse: BTreeMap<WarehouseId, i64> = BTreeMap::new();
    for stock in stocks.iter().filter(|s| s.product_id == product_id && s.location.is_internal()) {
        if let Some(warehouse_id) = stock.warehouse_id {
            *per_warehouse.entry(warehouse_id).or_default() += stock.quantity;
        }
    }
    per_warehouse
        .into_iter()
        .map(|(warehouse_id, quantity)| WarehouseStock {
            product_id,
            warehouse_id,
            quantity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::BinLocationId;
    use stockledger_stock::StockLocationReference;

    #[test]
    fn sums_internal_rows_per_owning_warehouse() {
        let product = ProductId::new();
        let w = WarehouseId::new();
        let mut at_warehouse = Stock::empty(product, StockLocationReference::warehouse(w), Some(w), 1);
        at_warehouse.quantity = 4;
        let mut in_bin = Stock::empty(product, StockLocationReference::bin_location(BinLocationId::new()), Some(w), 2);
        in_bin.quantity = 6;
        let mut external = Stock::empty(product, StockLocationReference::unknown(), None, 3);
        external.quantity = -10;

        let rollup = warehouse_stocks(product, &[at_warehouse, in_bin, external]);
        assert_eq!(rollup, vec![WarehouseStock { product_id: product, warehouse_id: w, quantity: 10 }]);
    }
}
