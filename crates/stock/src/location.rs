//! Stock location references: a closed set of "where stock is" variants.
//!
//! A `StockLocationReference` is a value object. It is never persisted on its own;
//! stock rows and movements borrow it. Equality, ordering and hashing are defined
//! over `(variant, primary key)`.
//!
//! ## External JSON shape
//!
//! ```text
//! "unknown"                                   special location (technical name)
//! {"warehouse": {"id": "<uuid>"}}             one key per entity variant
//! {"order": {"id": "<uuid>"}}                 live document version
//! {"order": {"id": "<uuid>", "versionId": "<uuid>"}}
//! ```

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockledger_core::{
    BinLocationId, DomainError, DomainResult, GoodsReceiptId, OrderId, ReturnOrderId, StockContainerId,
    ValueObject, VersionId, WarehouseId,
};

/// Bookkeeping locations that do not correspond to a physical place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialLocation {
    Unknown,
    Import,
    Initialization,
    StockCorrection,
    ProductTotalStockChange,
    ProductAvailableStockChange,
    ShopwareMigration,
}

impl SpecialLocation {
    pub const ALL: [SpecialLocation; 7] = [
        SpecialLocation::Unknown,
        SpecialLocation::Import,
        SpecialLocation::Initialization,
        SpecialLocation::StockCorrection,
        SpecialLocation::ProductTotalStockChange,
        SpecialLocation::ProductAvailableStockChange,
        SpecialLocation::ShopwareMigration,
    ];

    pub fn technical_name(&self) -> &'static str {
        match self {
            SpecialLocation::Unknown => "unknown",
            SpecialLocation::Import => "import",
            SpecialLocation::Initialization => "initialization",
            SpecialLocation::StockCorrection => "stock_correction",
            SpecialLocation::ProductTotalStockChange => "product_total_stock_change",
            SpecialLocation::ProductAvailableStockChange => "product_available_stock_change",
            SpecialLocation::ShopwareMigration => "shopware_migration",
        }
    }
}

impl core::fmt::Display for SpecialLocation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.technical_name())
    }
}

impl FromStr for SpecialLocation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|special| special.technical_name() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown special location '{s}'")))
    }
}

/// Variant tag of a location reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationKind {
    Warehouse,
    BinLocation,
    Order,
    ReturnOrder,
    StockContainer,
    GoodsReceipt,
    SpecialLocation,
}

impl LocationKind {
    /// Whether stock at locations of this kind counts toward owned inventory.
    pub fn is_internal(&self) -> bool {
        match self {
            LocationKind::Warehouse
            | LocationKind::BinLocation
            | LocationKind::StockContainer
            | LocationKind::GoodsReceipt => true,
            LocationKind::Order | LocationKind::ReturnOrder | LocationKind::SpecialLocation => {
                false
            }
        }
    }
}

/// Where stock is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "LocationDescriptor", into = "LocationDescriptor")]
pub enum StockLocationReference {
    Warehouse(WarehouseId),
    BinLocation(BinLocationId),
    Order { id: OrderId, version_id: VersionId },
    ReturnOrder { id: ReturnOrderId, version_id: VersionId },
    StockContainer(StockContainerId),
    GoodsReceipt(GoodsReceiptId),
    SpecialLocation(SpecialLocation),
}

impl ValueObject for StockLocationReference {}

impl StockLocationReference {
    pub fn warehouse(id: WarehouseId) -> Self {
        Self::Warehouse(id)
    }

    pub fn bin_location(id: BinLocationId) -> Self {
        Self::BinLocation(id)
    }

    /// Live version of an order.
    pub fn order(id: OrderId) -> Self {
        Self::Order {
            id,
            version_id: VersionId::live(),
        }
    }

    pub fn order_version(id: OrderId, version_id: VersionId) -> Self {
        Self::Order { id, version_id }
    }

    /// Live version of a return order.
    pub fn return_order(id: ReturnOrderId) -> Self {
        Self::ReturnOrder {
            id,
            version_id: VersionId::live(),
        }
    }

    pub fn return_order_version(id: ReturnOrderId, version_id: VersionId) -> Self {
        Self::ReturnOrder { id, version_id }
    }

    pub fn stock_container(id: StockContainerId) -> Self {
        Self::StockContainer(id)
    }

    pub fn goods_receipt(id: GoodsReceiptId) -> Self {
        Self::GoodsReceipt(id)
    }

    pub fn special(location: SpecialLocation) -> Self {
        Self::SpecialLocation(location)
    }

    pub fn unknown() -> Self {
        Self::SpecialLocation(SpecialLocation::Unknown)
    }

    pub fn kind(&self) -> LocationKind {
        match self {
            StockLocationReference::Warehouse(_) => LocationKind::Warehouse,
            StockLocationReference::BinLocation(_) => LocationKind::BinLocation,
            StockLocationReference::Order { .. } => LocationKind::Order,
            StockLocationReference::ReturnOrder { .. } => LocationKind::ReturnOrder,
            StockLocationReference::StockContainer(_) => LocationKind::StockContainer,
            StockLocationReference::GoodsReceipt(_) => LocationKind::GoodsReceipt,
            StockLocationReference::SpecialLocation(_) => LocationKind::SpecialLocation,
        }
    }

    /// Whether stock here counts toward total owned stock.
    pub fn is_internal(&self) -> bool {
        self.kind().is_internal()
    }

    pub fn is_special(&self, special: SpecialLocation) -> bool {
        matches!(self, StockLocationReference::SpecialLocation(s) if *s == special)
    }

    fn validate(self) -> DomainResult<Self> {
        let is_nil = match &self {
            StockLocationReference::Warehouse(id) => id.as_uuid().is_nil(),
            StockLocationReference::BinLocation(id) => id.as_uuid().is_nil(),
            StockLocationReference::Order { id, version_id } => {
                id.as_uuid().is_nil() || version_id.as_uuid().is_nil()
            }
            StockLocationReference::ReturnOrder { id, version_id } => {
                id.as_uuid().is_nil() || version_id.as_uuid().is_nil()
            }
            StockLocationReference::StockContainer(id) => id.as_uuid().is_nil(),
            StockLocationReference::GoodsReceipt(id) => id.as_uuid().is_nil(),
            StockLocationReference::SpecialLocation(_) => false,
        };
        if is_nil {
            return Err(DomainError::validation(format!(
                "{:?} location requires a non-empty id",
                self.kind()
            )));
        }
        Ok(self)
    }
}

impl core::fmt::Display for StockLocationReference {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StockLocationReference::Warehouse(id) => write!(f, "warehouse:{id}"),
            StockLocationReference::BinLocation(id) => write!(f, "binLocation:{id}"),
            StockLocationReference::Order { id, version_id } if version_id.is_live() => {
                write!(f, "order:{id}")
            }
            StockLocationReference::Order { id, version_id } => {
                write!(f, "order:{id}@{version_id}")
            }
            StockLocationReference::ReturnOrder { id, version_id } if version_id.is_live() => {
                write!(f, "returnOrder:{id}")
            }
            StockLocationReference::ReturnOrder { id, version_id } => {
                write!(f, "returnOrder:{id}@{version_id}")
            }
            StockLocationReference::StockContainer(id) => write!(f, "stockContainer:{id}"),
            StockLocationReference::GoodsReceipt(id) => write!(f, "goodsReceipt:{id}"),
            StockLocationReference::SpecialLocation(s) => write!(f, "{s}"),
        }
    }
}

/// Wire representation of a location reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LocationDescriptor {
    Special(SpecialLocation),
    Entity(EntityLocation),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum EntityLocation {
    Warehouse(Key<WarehouseId>),
    BinLocation(Key<BinLocationId>),
    Order(VersionedKey<OrderId>),
    ReturnOrder(VersionedKey<ReturnOrderId>),
    StockContainer(Key<StockContainerId>),
    GoodsReceipt(Key<GoodsReceiptId>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Key<T> {
    id: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct VersionedKey<T> {
    id: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_id: Option<VersionId>,
}

impl<T> VersionedKey<T> {
    fn new(id: T, version_id: VersionId) -> Self {
        Self {
            id,
            version_id: Some(version_id).filter(|v| !v.is_live()),
        }
    }

    /// The live version is spelled by omitting `versionId`; naming it
    /// explicitly would not survive re-encoding.
    fn version(&self) -> DomainResult<VersionId> {
        match self.version_id {
            None => Ok(VersionId::live()),
            Some(version) if version.is_live() => Err(DomainError::validation(
                "the live document version is implied; omit versionId",
            )),
            Some(version) => Ok(version),
        }
    }
}

impl TryFrom<LocationDescriptor> for StockLocationReference {
    type Error = DomainError;

    fn try_from(value: LocationDescriptor) -> Result<Self, Self::Error> {
        let location = match value {
            LocationDescriptor::Special(s) => StockLocationReference::SpecialLocation(s),
            LocationDescriptor::Entity(EntityLocation::Warehouse(k)) => Self::Warehouse(k.id),
            LocationDescriptor::Entity(EntityLocation::BinLocation(k)) => Self::BinLocation(k.id),
            LocationDescriptor::Entity(EntityLocation::Order(k)) => Self::Order {
                version_id: k.version()?,
                id: k.id,
            },
            LocationDescriptor::Entity(EntityLocation::ReturnOrder(k)) => Self::ReturnOrder {
                version_id: k.version()?,
                id: k.id,
            },
            LocationDescriptor::Entity(EntityLocation::StockContainer(k)) => {
                Self::StockContainer(k.id)
            }
            LocationDescriptor::Entity(EntityLocation::GoodsReceipt(k)) => {
                Self::GoodsReceipt(k.id)
            }
        };
        location.validate()
    }
}

impl From<StockLocationReference> for LocationDescriptor {
    fn from(value: StockLocationReference) -> Self {
        match value {
            StockLocationReference::SpecialLocation(s) => LocationDescriptor::Special(s),
            StockLocationReference::Warehouse(id) => {
                LocationDescriptor::Entity(EntityLocation::Warehouse(Key { id }))
            }
            StockLocationReference::BinLocation(id) => {
                LocationDescriptor::Entity(EntityLocation::BinLocation(Key { id }))
            }
            StockLocationReference::Order { id, version_id } => {
                LocationDescriptor::Entity(EntityLocation::Order(VersionedKey::new(id, version_id)))
            }
            StockLocationReference::ReturnOrder { id, version_id } => LocationDescriptor::Entity(
                EntityLocation::ReturnOrder(VersionedKey::new(id, version_id)),
            ),
            StockLocationReference::StockContainer(id) => {
                LocationDescriptor::Entity(EntityLocation::StockContainer(Key { id }))
            }
            StockLocationReference::GoodsReceipt(id) => {
                LocationDescriptor::Entity(EntityLocation::GoodsReceipt(Key { id }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn internal_and_external_variants() {
        assert!(StockLocationReference::warehouse(WarehouseId::new()).is_internal());
        assert!(StockLocationReference::bin_location(BinLocationId::new()).is_internal());
        assert!(StockLocationReference::stock_container(StockContainerId::new()).is_internal());
        assert!(StockLocationReference::goods_receipt(GoodsReceiptId::new()).is_internal());

        assert!(!StockLocationReference::order(OrderId::new()).is_internal());
        assert!(!StockLocationReference::return_order(ReturnOrderId::new()).is_internal());
        for special in SpecialLocation::ALL {
            assert!(!StockLocationReference::special(special).is_internal());
        }
    }

    #[test]
    fn equality_is_defined_by_variant_and_key() {
        let uuid = uuid_like();
        let warehouse = StockLocationReference::warehouse(WarehouseId::from_uuid(uuid));
        let container = StockLocationReference::stock_container(StockContainerId::from_uuid(uuid));
        assert_ne!(warehouse, container);

        let again = StockLocationReference::warehouse(WarehouseId::from_uuid(uuid));
        let set: HashSet<_> = [warehouse, again, container].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn order_versions_are_distinct_locations() {
        let id = OrderId::new();
        let live = StockLocationReference::order(id);
        let draft = StockLocationReference::order_version(id, VersionId::new());
        assert_ne!(live, draft);
    }

    #[test]
    fn special_location_serializes_as_technical_name() {
        let json = serde_json::to_value(StockLocationReference::unknown()).unwrap();
        assert_eq!(json, json!("unknown"));

        let parsed: StockLocationReference =
            serde_json::from_value(json!("product_total_stock_change")).unwrap();
        assert_eq!(
            parsed,
            StockLocationReference::special(SpecialLocation::ProductTotalStockChange)
        );
    }

    #[test]
    fn entity_locations_use_single_key_objects() {
        let id = WarehouseId::new();
        let json = serde_json::to_value(StockLocationReference::warehouse(id)).unwrap();
        assert_eq!(json, json!({ "warehouse": { "id": id.to_string() } }));

        let bin = BinLocationId::new();
        let json = serde_json::to_value(StockLocationReference::bin_location(bin)).unwrap();
        assert_eq!(json, json!({ "binLocation": { "id": bin.to_string() } }));
    }

    #[test]
    fn descriptor_shapes_round_trip_unchanged() {
        let shapes = vec![
            json!("unknown"),
            json!("shopware_migration"),
            json!({ "warehouse": { "id": WarehouseId::new().to_string() } }),
            json!({ "binLocation": { "id": BinLocationId::new().to_string() } }),
            json!({ "order": { "id": OrderId::new().to_string() } }),
            json!({ "order": { "id": OrderId::new().to_string(), "versionId": VersionId::new().to_string() } }),
            json!({ "returnOrder": { "id": ReturnOrderId::new().to_string() } }),
            json!({ "stockContainer": { "id": StockContainerId::new().to_string() } }),
            json!({ "goodsReceipt": { "id": GoodsReceiptId::new().to_string() } }),
        ];

        for shape in shapes {
            let location: StockLocationReference = serde_json::from_value(shape.clone()).unwrap();
            assert_eq!(serde_json::to_value(location).unwrap(), shape);
        }
    }

    #[test]
    fn explicit_live_version_is_rejected() {
        let shape = json!({
            "order": { "id": OrderId::new().to_string(), "versionId": VersionId::live().to_string() }
        });
        let err = serde_json::from_value::<StockLocationReference>(shape).unwrap_err();
        assert!(err.to_string().contains("versionId"));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let id = WarehouseId::new().to_string();
        let bad = vec![
            json!("not_a_location"),
            json!({ "warehouse": { "id": id, "extra": 1 } }),
            json!({ "warehouse": { "id": id }, "binLocation": { "id": id } }),
            json!({ "shelf": { "id": id } }),
            json!({ "warehouse": { "id": "00000000-0000-0000-0000-000000000000" } }),
        ];

        for shape in bad {
            assert!(
                serde_json::from_value::<StockLocationReference>(shape.clone()).is_err(),
                "accepted {shape}"
            );
        }
    }

    #[test]
    fn special_location_parses_from_technical_name() {
        for special in SpecialLocation::ALL {
            assert_eq!(special.technical_name().parse::<SpecialLocation>().unwrap(), special);
        }
        assert!("warehouse".parse::<SpecialLocation>().is_err());
    }

    fn uuid_like() -> uuid::Uuid {
        *WarehouseId::new().as_uuid()
    }
}
