//! Structural whitelist for source/destination pairings.
//!
//! Checked for a whole batch of movements before any lock is taken; every
//! violation is reported, not just the first.

use serde::Serialize;

use stockledger_core::{Entity, ProductId, StockMovementId};

use crate::location::{SpecialLocation, StockLocationReference};
use crate::movement::StockMovement;

/// The rule a movement broke.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    SourceEqualsDestination,
    ReturnOrderRequiresOrderOrUnknownSource,
    ReturnOrderSourceRequiresInternalOrUnknownDestination,
    GoodsReceiptRequiresStockSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCombinationViolation {
    pub movement_id: StockMovementId,
    pub product_id: ProductId,
    pub source: StockLocationReference,
    pub destination: StockLocationReference,
    pub rule: CombinationRule,
}

/// Check one pairing. `None` means the pairing is allowed.
pub fn check_location_combination(
    source: &StockLocationReference,
    destination: &StockLocationReference,
) -> Option<CombinationRule> {
    use StockLocationReference as L;

    if source == destination {
        return Some(CombinationRule::SourceEqualsDestination);
    }

    match destination {
        L::ReturnOrder { .. } => match source {
            L::Order { .. } | L::SpecialLocation(SpecialLocation::Unknown) => {}
            L::Warehouse(_)
            | L::BinLocation(_)
            | L::ReturnOrder { .. }
            | L::StockContainer(_)
            | L::GoodsReceipt(_)
            | L::SpecialLocation(_) => {
                return Some(CombinationRule::ReturnOrderRequiresOrderOrUnknownSource);
            }
        },
        L::GoodsReceipt(_) => match source {
            L::Warehouse(_)
            | L::BinLocation(_)
            | L::StockContainer(_)
            | L::GoodsReceipt(_)
            | L::SpecialLocation(_) => {}
            L::Order { .. } | L::ReturnOrder { .. } => {
                return Some(CombinationRule::GoodsReceiptRequiresStockSource);
            }
        },
        L::Warehouse(_)
        | L::BinLocation(_)
        | L::Order { .. }
        | L::StockContainer(_)
        | L::SpecialLocation(_) => {}
    }

    if let L::ReturnOrder { .. } = source {
        let allowed = destination.is_internal()
            || destination.is_special(SpecialLocation::Unknown);
        if !allowed {
            return Some(CombinationRule::ReturnOrderSourceRequiresInternalOrUnknownDestination);
        }
    }

    None
}

/// Collect every disallowed pairing in a batch.
pub fn find_location_combination_violations(
    movements: &[StockMovement],
) -> Vec<LocationCombinationViolation> {
    movements
        .iter()
        .filter_map(|m| {
            check_location_combination(m.source(), m.destination()).map(|rule| {
                LocationCombinationViolation {
                    movement_id: m.id(),
                    product_id: m.product_id(),
                    source: *m.source(),
                    destination: *m.destination(),
                    rule,
                }
            })
        })
        .collect()
}
