use serde::Serialize;
use thiserror::Error;

use stockledger_core::ProductId;

use crate::quantity::{ProductQuantity, ProductQuantityLocation};

/// A picking request that could not be met in full.
///
/// Carries everything assembled so far, so callers can apply a fallback policy
/// instead of losing the partial result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortage {
    pub partial_solution: Vec<ProductQuantityLocation>,
    pub shortages: Vec<ProductQuantity>,
}

impl StockShortage {
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.shortages.iter().map(|pq| pq.product_id).collect()
    }

    pub fn shortage_of(&self, product_id: ProductId) -> i64 {
        self.shortages
            .iter()
            .filter(|pq| pq.product_id == product_id)
            .map(|pq| pq.quantity)
            .sum()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "reason")]
pub enum AllocationError {
    #[error("not enough stock for {} product(s)", .0.shortages.len())]
    StockShortage(StockShortage),

    #[error("no eligible location for products {product_ids:?}")]
    NoEligibleLocation { product_ids: Vec<ProductId> },

    #[error("cannot allocate negative quantity {quantity} of product {product_id}")]
    NegativeNeed { product_id: ProductId, quantity: i64 },
}
