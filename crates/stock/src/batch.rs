//! Batch breakdowns: an ordered `batch -> quantity` partition of a quantity.
//!
//! Order is significant. Stock rows keep their batches earliest-created first and
//! picking consumes them in that order. On the wire a breakdown is a JSON object
//! whose key order is the stored order.

use core::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use stockledger_core::{BatchId, ValueObject};

/// Quantity of one batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BatchQuantity {
    pub batch_id: BatchId,
    pub quantity: i64,
}

/// Ordered batch breakdown. Entries are unique per batch and never zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchQuantities(Vec<BatchQuantity>);

impl ValueObject for BatchQuantities {}

impl BatchQuantities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pairs; duplicate batches are merged at their first position.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (BatchId, i64)>) -> Self {
        let mut out = Self::new();
        for (batch_id, quantity) in pairs {
            out.add(batch_id, quantity);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchQuantity> {
        self.0.iter()
    }

    pub fn get(&self, batch_id: BatchId) -> i64 {
        self.0
            .iter()
            .find(|b| b.batch_id == batch_id)
            .map(|b| b.quantity)
            .unwrap_or(0)
    }

    /// Sum of all entries (saturating).
    pub fn total(&self) -> i64 {
        self.0
            .iter()
            .fold(0i64, |acc, b| acc.saturating_add(b.quantity))
    }

    /// Sum of the positive entries only.
    pub fn positive_total(&self) -> i64 {
        self.0
            .iter()
            .filter(|b| b.quantity > 0)
            .fold(0i64, |acc, b| acc.saturating_add(b.quantity))
    }

    /// Add `quantity` to a batch, appending it if new. Entries reaching zero are removed.
    pub fn add(&mut self, batch_id: BatchId, quantity: i64) {
        if let Some(pos) = self.0.iter().position(|b| b.batch_id == batch_id) {
            let entry = &mut self.0[pos];
            entry.quantity = entry.quantity.saturating_add(quantity);
            if entry.quantity == 0 {
                self.0.remove(pos);
            }
        } else if quantity != 0 {
            self.0.push(BatchQuantity { batch_id, quantity });
        }
    }

    pub fn negated(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|b| BatchQuantity {
                    batch_id: b.batch_id,
                    quantity: -b.quantity,
                })
                .collect(),
        )
    }

    /// Take up to `quantity` from the positive entries, in stored order.
    ///
    /// The returned subset's total is `min(quantity, positive_total())`.
    pub fn take_in_order(&self, quantity: i64) -> BatchQuantities {
        let mut remaining = quantity.max(0);
        let mut taken = Vec::new();
        for entry in self.0.iter().filter(|b| b.quantity > 0) {
            if remaining == 0 {
                break;
            }
            let take = entry.quantity.min(remaining);
            taken.push(BatchQuantity {
                batch_id: entry.batch_id,
                quantity: take,
            });
            remaining -= take;
        }
        Self(taken)
    }

    /// Remove up to `quantity` from the positive entries, in stored order.
    pub fn consume_in_order(&mut self, quantity: i64) {
        for entry in self.take_in_order(quantity).0 {
            self.add(entry.batch_id, -entry.quantity);
        }
    }

    /// Reorder entries by a key (stable).
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&BatchQuantity) -> K) {
        self.0.sort_by_key(|b| key(b));
    }
}

impl FromIterator<(BatchId, i64)> for BatchQuantities {
    fn from_iter<T: IntoIterator<Item = (BatchId, i64)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

impl Serialize for BatchQuantities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.batch_id, &entry.quantity)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BatchQuantities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BatchMapVisitor;

        impl<'de> Visitor<'de> for BatchMapVisitor {
            type Value = BatchQuantities;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of batch ids to quantities")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = BatchQuantities::new();
                while let Some((batch_id, quantity)) = access.next_entry::<BatchId, i64>()? {
                    out.add(batch_id, quantity);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(BatchMapVisitor)
    }
}
