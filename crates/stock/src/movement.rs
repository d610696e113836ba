//! The atomic stock movement: N units of one product from one location to another.
//!
//! Movements are immutable audit records. They are validated and normalized on
//! construction and appended to the ledger exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockledger_core::{BatchId, Entity, ProcessId, ProductId, StockMovementId, UserId};

use crate::batch::BatchQuantities;
use crate::location::StockLocationReference;

/// Largest absolute quantity a single movement may carry.
pub const MAX_MOVEMENT_QUANTITY: i64 = i32::MAX as i64;

/// Caller-supplied movement descriptor (signed quantity, not yet validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStockMovement {
    pub product_id: ProductId,
    pub quantity: i64,
    pub source: StockLocationReference,
    pub destination: StockLocationReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches: Option<BatchQuantities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<ProcessId>,
}

impl NewStockMovement {
    pub fn new(
        product_id: ProductId,
        quantity: i64,
        source: StockLocationReference,
        destination: StockLocationReference,
    ) -> Self {
        Self {
            product_id,
            quantity,
            source,
            destination,
            batches: None,
            comment: None,
            user_id: None,
            process_id: None,
        }
    }

    pub fn with_batches(mut self, batches: BatchQuantities) -> Self {
        self.batches = Some(batches);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_process(mut self, process_id: ProcessId) -> Self {
        self.process_id = Some(process_id);
        self
    }
}

/// Malformed movement. Rejected before any transaction is opened.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "reason")]
pub enum MovementError {
    #[error("movement of product {product_id} has zero quantity")]
    ZeroQuantity { product_id: ProductId },

    #[error("movement of product {product_id} has quantity {quantity} outside ±{max}")]
    QuantityOutOfRange {
        product_id: ProductId,
        quantity: i64,
        max: i64,
    },

    #[error("batch quantities of product {product_id} sum to {batch_total}, movement quantity is {quantity}")]
    BatchQuantityMismatch {
        product_id: ProductId,
        quantity: i64,
        batch_total: i64,
    },

    #[error("batch {batch_id} of product {product_id} has quantity {quantity} opposing the movement direction")]
    InvalidBatchQuantity {
        product_id: ProductId,
        batch_id: BatchId,
        quantity: i64,
    },
}

impl MovementError {
    pub fn product_id(&self) -> ProductId {
        match self {
            MovementError::ZeroQuantity { product_id }
            | MovementError::QuantityOutOfRange { product_id, .. }
            | MovementError::BatchQuantityMismatch { product_id, .. }
            | MovementError::InvalidBatchQuantity { product_id, .. } => *product_id,
        }
    }
}

/// An immutable, normalized movement (quantity > 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    id: StockMovementId,
    product_id: ProductId,
    quantity: i64,
    source: StockLocationReference,
    destination: StockLocationReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    batches: Option<BatchQuantities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_id: Option<ProcessId>,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Validate and normalize a movement descriptor.
    ///
    /// A negative quantity swaps source and destination and negates the quantity
    /// (and every batch quantity).
    pub fn create(new: NewStockMovement) -> Result<Self, MovementError> {
        let NewStockMovement {
            product_id,
            quantity,
            mut source,
            mut destination,
            batches,
            comment,
            user_id,
            process_id,
        } = new;

        if quantity == 0 {
            return Err(MovementError::ZeroQuantity { product_id });
        }
        if quantity.unsigned_abs() > MAX_MOVEMENT_QUANTITY as u64 {
            return Err(MovementError::QuantityOutOfRange {
                product_id,
                quantity,
                max: MAX_MOVEMENT_QUANTITY,
            });
        }

        if let Some(batches) = &batches {
            if let Some(opposing) = batches
                .iter()
                .find(|b| b.quantity.signum() != quantity.signum())
            {
                return Err(MovementError::InvalidBatchQuantity {
                    product_id,
                    batch_id: opposing.batch_id,
                    quantity: opposing.quantity,
                });
            }
            let batch_total = batches.total();
            if batch_total != quantity {
                return Err(MovementError::BatchQuantityMismatch {
                    product_id,
                    quantity,
                    batch_total,
                });
            }
        }

        let (quantity, batches) = if quantity < 0 {
            core::mem::swap(&mut source, &mut destination);
            (-quantity, batches.map(|b| b.negated()))
        } else {
            (quantity, batches)
        };

        Ok(Self {
            id: StockMovementId::new(),
            product_id,
            quantity,
            source,
            destination,
            batches: batches.filter(|b| !b.is_empty()),
            comment,
            user_id,
            process_id,
            created_at: Utc::now(),
        })
    }

    /// Shorthand for a movement without batch or audit metadata.
    pub fn between(
        product_id: ProductId,
        quantity: i64,
        source: StockLocationReference,
        destination: StockLocationReference,
    ) -> Result<Self, MovementError> {
        Self::create(NewStockMovement::new(product_id, quantity, source, destination))
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn source(&self) -> &StockLocationReference {
        &self.source
    }

    pub fn destination(&self) -> &StockLocationReference {
        &self.destination
    }

    pub fn batches(&self) -> Option<&BatchQuantities> {
        self.batches.as_ref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn process_id(&self) -> Option<ProcessId> {
        self.process_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Signed effect of this movement on the balance of `location`.
    pub fn delta_at(&self, location: &StockLocationReference) -> i64 {
        let mut delta = 0;
        if self.destination == *location {
            delta += self.quantity;
        }
        if self.source == *location {
            delta -= self.quantity;
        }
        delta
    }
}

impl Entity for StockMovement {
    type Id = StockMovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
