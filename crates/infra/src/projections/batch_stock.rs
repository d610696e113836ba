use std::collections::BTreeMap;

use serde::Serialize;

use stockledger_core::{BatchId, ProductId};
use stockledger_stock::Stock;

/// Physical stock of one batch across all internal locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStock {
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub physical_stock: i64,
}

pub fn batch_stocks(product_id: ProductId, stocks: &[Stock]) -> Vec<BatchStock> {
    let mut per_batch: BTreeMap<BatchId, i64> = BTreeMap::new();
    for stock in stocks.iter().filter(|s| s.product_id == product_id && s.location.is_internal()) {
        for entry in stock.batches.iter() {
            *per_batch.entry(entry.batch_id).or_default() += entry.quantity;
        }
    }
    per_batch
        .into_iter()
        .filter(|(_, quantity)| *quantity != 0)
        .map(|(batch_id, physical_stock)| BatchStock {
            product_id,
            batch_id,
            physical_stock,
        })
        .collect()
}
