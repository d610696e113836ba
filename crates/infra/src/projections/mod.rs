//! Derived aggregates kept consistent by the ledger writer.
//!
//! Rollups are pure functions of a product's stock rows plus master data, so a
//! store can recompute them for every touched product inside the commit.

pub mod batch_stock;
pub mod product_stock;
pub mod warehouse_stock;

use std::collections::BTreeMap;

use serde::Serialize;

use stockledger_core::WarehouseId;
use stockledger_stock::{Product, Stock, Warehouse};

pub use batch_stock::{BatchStock, batch_stocks};
pub use product_stock::{ProductStockSummary, product_stock_summary};
pub use warehouse_stock::{WarehouseStock, warehouse_stocks};

/// Aggregates for a set of products, as refreshed by one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub products: Vec<ProductStockSummary>,
    pub warehouses: Vec<WarehouseStock>,
    pub batches: Vec<BatchStock>,
}

impl AggregateSnapshot {
    pub fn product(&self, product_id: stockledger_core::ProductId) -> Option<&ProductStockSummary> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    pub fn extend(&mut self, other: AggregateSnapshot) {
        self.products.extend(other.products);
        self.warehouses.extend(other.warehouses);
        self.batches.extend(other.batches);
    }
}

/// All rollups of one product. `stocks` must be that product's rows.
pub fn rollup(
    product: &Product,
    stocks: &[Stock],
    warehouses: &BTreeMap<WarehouseId, Warehouse>,
) -> AggregateSnapshot {
    AggregateSnapshot {
        products: vec![product_stock_summary(product, stocks, warehouses)],
        warehouses: warehouse_stocks(product.id, stocks),
        batches: batch_stocks(product.id, stocks),
    }
}
