//! Quantity value objects used as allocation input and output, and the scope
//! (`StockArea`) an allocation is allowed to touch.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, ValueObject, WarehouseId};

use crate::batch::BatchQuantities;
use crate::location::StockLocationReference;
use crate::movement::NewStockMovement;
use crate::stock::Stock;

/// A quantity of one product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantity {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl ValueObject for ProductQuantity {}

impl ProductQuantity {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }

    /// Sum quantities per product; output is ordered by product id.
    pub fn merge(quantities: impl IntoIterator<Item = ProductQuantity>) -> Vec<ProductQuantity> {
        let mut merged: BTreeMap<ProductId, i64> = BTreeMap::new();
        for pq in quantities {
            *merged.entry(pq.product_id).or_default() += pq.quantity;
        }
        merged
            .into_iter()
            .map(|(product_id, quantity)| ProductQuantity::new(product_id, quantity))
            .collect()
    }
}

/// A quantity of one product anchored to a location, optionally with the batch
/// subset it consists of (whose total then equals `quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantityLocation {
    pub location: StockLocationReference,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches: Option<BatchQuantities>,
}

impl ValueObject for ProductQuantityLocation {}

impl ProductQuantityLocation {
    pub fn new(location: StockLocationReference, product_id: ProductId, quantity: i64) -> Self {
        Self {
            location,
            product_id,
            quantity,
            batches: None,
        }
    }

    pub fn with_batches(mut self, batches: BatchQuantities) -> Self {
        self.batches = Some(batches);
        self
    }

    pub fn product_quantity(&self) -> ProductQuantity {
        ProductQuantity::new(self.product_id, self.quantity)
    }

    /// A movement drawing this quantity out of `self.location`.
    pub fn movement_to(&self, destination: StockLocationReference) -> NewStockMovement {
        let movement = NewStockMovement::new(self.product_id, self.quantity, self.location, destination);
        match &self.batches {
            Some(batches) => movement.with_batches(batches.clone()),
            None => movement,
        }
    }

    /// A movement placing this quantity into `self.location`.
    pub fn movement_from(&self, source: StockLocationReference) -> NewStockMovement {
        let movement = NewStockMovement::new(self.product_id, self.quantity, source, self.location);
        match &self.batches {
            Some(batches) => movement.with_batches(batches.clone()),
            None => movement,
        }
    }

    /// Total quantity per product over a solution.
    pub fn totals(solution: &[ProductQuantityLocation]) -> Vec<ProductQuantity> {
        ProductQuantity::merge(solution.iter().map(|pql| pql.product_quantity()))
    }
}

/// Scope of an allocation: specific warehouses, or every internal location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockArea {
    Everywhere,
    Warehouses(BTreeSet<WarehouseId>),
}

impl ValueObject for StockArea {}

impl StockArea {
    pub fn everywhere() -> Self {
        StockArea::Everywhere
    }

    pub fn warehouse(id: WarehouseId) -> Self {
        StockArea::Warehouses(BTreeSet::from([id]))
    }

    pub fn warehouses(ids: impl IntoIterator<Item = WarehouseId>) -> Self {
        StockArea::Warehouses(ids.into_iter().collect())
    }

    pub fn allows_warehouse(&self, warehouse_id: WarehouseId) -> bool {
        match self {
            StockArea::Everywhere => true,
            StockArea::Warehouses(ids) => ids.contains(&warehouse_id),
        }
    }

    /// Whether an internal location owned by `warehouse_id` lies inside the area.
    ///
    /// External and special locations are never part of an area.
    pub fn contains_location(
        &self,
        location: &StockLocationReference,
        warehouse_id: Option<WarehouseId>,
    ) -> bool {
        if !location.is_internal() {
            return false;
        }
        match self {
            StockArea::Everywhere => true,
            StockArea::Warehouses(ids) => warehouse_id.is_some_and(|w| ids.contains(&w)),
        }
    }

    pub fn contains(&self, stock: &Stock) -> bool {
        self.contains_location(&stock.location, stock.warehouse_id)
    }
}
