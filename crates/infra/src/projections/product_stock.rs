use std::collections::BTreeMap;

use serde::Serialize;

use stockledger_core::{ProductId, WarehouseId};
use stockledger_stock::{Product, Stock, Warehouse};

/// Per-product stock figures.
///
/// `available = physical - reserved - not_available_for_sale`. Internal stock
/// not attributable to a for-sale warehouse counts as not available for sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStockSummary {
    pub product_id: ProductId,
    pub physical_stock: i64,
    pub reserved_stock: i64,
    pub stock_not_available_for_sale: i64,
    pub available_stock: i64,
}

pub fn product_stock_summary(
    product: &Product,
    stocks: &[Stock],
    warehouses: &BTreeMap<WarehouseId, Warehouse>,
) -> ProductStockSummary {
    let mut physical = 0i64;
    let mut not_for_sale = 0i64;

    for stock in stocks.iter().filter(|s| s.product_id == product.id && s.location.is_internal()) {
        physical += stock.quantity;
        let for_sale = stock
            .warehouse_id
            .and_then(|id| warehouses.get(&id))
            .is_some_and(|w| w.is_stock_available_for_sale);
        if !for_sale {
            not_for_sale += stock.quantity;
        }
    }

    ProductStockSummary {
        product_id: product.id,
        physical_stock: physical,
        reserved_stock: product.reserved_stock,
        stock_not_available_for_sale: not_for_sale,
        available_stock: physical - product.reserved_stock - not_for_sale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::OrderId;
    use stockledger_stock::StockLocationReference;

    #[test]
    fn available_excludes_reserved_and_not_for_sale_stock() {
        let selling = Warehouse::new(WarehouseId::new(), "shop", Utc::now());
        let storage = Warehouse::new(WarehouseId::new(), "storage", Utc::now()).not_for_sale();
        let warehouses: BTreeMap<_, _> = [(selling.id, selling.clone()), (storage.id, storage.clone())].into();

        let mut product = Product::new(ProductId::new(), "P-1");
        product.reserved_stock = 3;

        let row = |location, warehouse_id, quantity| {
            let mut s = Stock::empty(product.id, location, warehouse_id, 0);
            s.quantity = quantity;
            s
        };
        let stocks = vec![
            row(StockLocationReference::warehouse(selling.id), Some(selling.id), 10),
            row(StockLocationReference::warehouse(storage.id), Some(storage.id), 5),
            row(StockLocationReference::order(OrderId::new()), None, 7),
        ];

        let summary = product_stock_summary(&product, &stocks, &warehouses);
        assert_eq!(summary.physical_stock, 15);
        assert_eq!(summary.stock_not_available_for_sale, 5);
        assert_eq!(summary.available_stock, 7);
    }
}
