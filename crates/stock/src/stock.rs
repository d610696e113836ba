//! Stock balances: the materialized fold of all movements touching a
//! (product, location) pair.

use std::collections::BTreeSet;

use serde::Serialize;

use stockledger_core::{ProductId, WarehouseId};

use crate::batch::BatchQuantities;
use crate::location::StockLocationReference;
use crate::quantity::StockArea;

/// Key of a stock row. Ordered, so it doubles as a deterministic lock key.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockKey {
    pub product_id: ProductId,
    pub location: StockLocationReference,
}

impl StockKey {
    pub fn new(product_id: ProductId, location: StockLocationReference) -> Self {
        Self {
            product_id,
            location,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.location)
    }
}

/// Balance of one product at one location.
///
/// `batches` covers the batch-tracked portion of the balance. `warehouse_id` is the
/// warehouse owning the location (resolved from master data), `sequence` the order
/// in which rows were first created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub product_id: ProductId,
    pub location: StockLocationReference,
    pub quantity: i64,
    pub batches: BatchQuantities,
    pub warehouse_id: Option<WarehouseId>,
    pub sequence: u64,
}

impl Stock {
    pub fn empty(
        product_id: ProductId,
        location: StockLocationReference,
        warehouse_id: Option<WarehouseId>,
        sequence: u64,
    ) -> Self {
        Self {
            product_id,
            location,
            quantity: 0,
            batches: BatchQuantities::new(),
            warehouse_id,
            sequence,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.location)
    }

    /// Positive quantity not attributed to any batch.
    pub fn untracked_quantity(&self) -> i64 {
        (self.quantity - self.batches.positive_total()).max(0)
    }
}

/// Which locations a stock query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationSelector {
    Any,
    Exactly(BTreeSet<StockLocationReference>),
    Area(StockArea),
}

/// Predicate over stock rows, evaluated by stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockFilter {
    pub products: Option<BTreeSet<ProductId>>,
    pub locations: LocationSelector,
}

impl StockFilter {
    pub fn everything() -> Self {
        Self {
            products: None,
            locations: LocationSelector::Any,
        }
    }

    pub fn for_products(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            products: Some(products.into_iter().collect()),
            locations: LocationSelector::Any,
        }
    }

    /// Rows at exactly this location, for any product.
    pub fn at_location(location: StockLocationReference) -> Self {
        Self {
            products: None,
            locations: LocationSelector::Exactly(BTreeSet::from([location])),
        }
    }

    pub fn in_area(mut self, area: StockArea) -> Self {
        self.locations = LocationSelector::Area(area);
        self
    }

    pub fn matches_product(&self, product_id: ProductId) -> bool {
        self.products
            .as_ref()
            .is_none_or(|products| products.contains(&product_id))
    }

    pub fn matches(&self, stock: &Stock) -> bool {
        if !self.matches_product(stock.product_id) {
            return false;
        }
        match &self.locations {
            LocationSelector::Any => true,
            LocationSelector::Exactly(locations) => locations.contains(&stock.location),
            LocationSelector::Area(area) => area.contains(stock),
        }
    }
}

impl StockLocationReference {
    /// Filter selecting the stock rows stored at this location.
    pub fn filter(&self) -> StockFilter {
        StockFilter::at_location(*self)
    }
}
