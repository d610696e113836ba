use std::collections::BTreeMap;

use stockledger_core::{BinLocationId, ProductId, WarehouseId};

use crate::catalog::{Product, Warehouse};
use crate::quantity::StockArea;
use crate::stock::Stock;

/// Read-only view of the inventory an allocation may draw on.
///
/// Warehouses are kept in priority order (default, oldest, id).
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    warehouses: Vec<Warehouse>,
    products: BTreeMap<ProductId, Product>,
    stocks: BTreeMap<ProductId, Vec<Stock>>,
}

impl InventorySnapshot {
    pub fn new(
        mut warehouses: Vec<Warehouse>,
        products: impl IntoIterator<Item = Product>,
        stocks: impl IntoIterator<Item = Stock>,
    ) -> Self {
        Warehouse::sort_by_priority(&mut warehouses);
        let mut by_product: BTreeMap<ProductId, Vec<Stock>> = BTreeMap::new();
        for stock in stocks {
            by_product.entry(stock.product_id).or_default().push(stock);
        }
        Self {
            warehouses,
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            stocks: by_product,
        }
    }

    /// Warehouses in priority order.
    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    /// Eligible warehouses for an area, in priority order.
    pub fn warehouses_in<'a>(&'a self, area: &'a StockArea) -> impl Iterator<Item = &'a Warehouse> + 'a {
        self.warehouses.iter().filter(move |w| area.allows_warehouse(w.id))
    }

    /// Position of a warehouse in the priority order; unknown or absent sorts last.
    pub fn warehouse_rank(&self, warehouse_id: Option<WarehouseId>) -> usize {
        warehouse_id
            .and_then(|id| self.warehouses.iter().position(|w| w.id == id))
            .unwrap_or(usize::MAX)
    }

    pub fn product(&self, product_id: ProductId) -> Option<&Product> {
        self.products.get(&product_id)
    }

    pub fn default_bin_location(&self, product_id: ProductId, warehouse_id: WarehouseId) -> Option<BinLocationId> {
        self.product(product_id)
            .and_then(|p| p.default_bin_locations.get(&warehouse_id).copied())
    }

    pub fn stocks_of(&self, product_id: ProductId) -> &[Stock] {
        self.stocks.get(&product_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
