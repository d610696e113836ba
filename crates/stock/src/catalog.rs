//! Master data the ledger consults: products, warehouses, bin locations, batches.
//!
//! These records are owned by collaborators outside the stock engine; the engine
//! only reads them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{BatchId, BinLocationId, Entity, ProductId, WarehouseId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub product_number: String,
    pub name: String,
    /// Stock management disabled means the product may go negative anywhere and
    /// must not be placed into bin locations.
    pub stock_managed: bool,
    pub batch_managed: bool,
    /// Units reserved by open orders (maintained by order workflows).
    pub reserved_stock: i64,
    /// Preferred bin location per warehouse, used when stocking.
    #[serde(default)]
    pub default_bin_locations: BTreeMap<WarehouseId, BinLocationId>,
}

impl Product {
    pub fn new(id: ProductId, product_number: impl Into<String>) -> Self {
        let product_number = product_number.into();
        Self {
            id,
            name: product_number.clone(),
            product_number,
            stock_managed: true,
            batch_managed: false,
            reserved_stock: 0,
            default_bin_locations: BTreeMap::new(),
        }
    }

    pub fn without_stock_management(mut self) -> Self {
        self.stock_managed = false;
        self
    }

    pub fn with_batch_management(mut self) -> Self {
        self.batch_managed = true;
        self
    }

    pub fn with_default_bin_location(mut self, warehouse_id: WarehouseId, bin: BinLocationId) -> Self {
        self.default_bin_locations.insert(warehouse_id, bin);
        self
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub is_default: bool,
    pub is_stock_available_for_sale: bool,
    pub created_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn new(id: WarehouseId, code: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let code = code.into();
        Self {
            id,
            name: code.clone(),
            code,
            is_default: false,
            is_stock_available_for_sale: true,
            created_at,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn not_for_sale(mut self) -> Self {
        self.is_stock_available_for_sale = false;
        self
    }

    /// Stable total order: default first, then oldest, then id.
    pub fn priority_cmp(&self, other: &Warehouse) -> Ordering {
        other
            .is_default
            .cmp(&self.is_default)
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn sort_by_priority(warehouses: &mut [Warehouse]) {
        warehouses.sort_by(Warehouse::priority_cmp);
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinLocation {
    pub id: BinLocationId,
    pub warehouse_id: WarehouseId,
    pub code: String,
}

impl BinLocation {
    pub fn new(id: BinLocationId, warehouse_id: WarehouseId, code: impl Into<String>) -> Self {
        Self {
            id,
            warehouse_id,
            code: code.into(),
        }
    }
}

impl Entity for BinLocation {
    type Id = BinLocationId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A lot of a product. Batches are consumed earliest-created first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: BatchId,
    pub product_id: ProductId,
    pub number: String,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: BatchId, product_id: ProductId, number: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            product_id,
            number: number.into(),
            created_at,
        }
    }
}

impl Entity for Batch {
    type Id = BatchId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn default_warehouse_outranks_older_ones() {
        let now = Utc::now();
        let mut warehouses = vec![
            Warehouse::new(WarehouseId::new(), "old", now - Duration::days(10)),
            Warehouse::new(WarehouseId::new(), "default", now).as_default(),
            Warehouse::new(WarehouseId::new(), "older", now - Duration::days(20)),
        ];
        Warehouse::sort_by_priority(&mut warehouses);
        let codes: Vec<_> = warehouses.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["default", "older", "old"]);
    }

    #[test]
    fn equal_creation_time_falls_back_to_id() {
        let now = Utc::now();
        let mut warehouses = vec![
            Warehouse::new(WarehouseId::new(), "b", now),
            Warehouse::new(WarehouseId::new(), "a", now),
        ];
        Warehouse::sort_by_priority(&mut warehouses);
        assert!(warehouses[0].id < warehouses[1].id);
    }
}
