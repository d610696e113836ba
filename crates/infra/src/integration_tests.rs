//! Integration tests for the full stock pipeline.
//!
//! Tests: movement descriptors → Ledger Writer → stock rows → derived aggregates
//!
//! Verifies:
//! - Balances follow the ledger (conservation) and stay non-negative
//! - Batches are applied all-or-nothing
//! - Concurrent writers on the same stock row serialize
//! - Transient conflicts are retried within the configured bound
//! - Reconciliation writers and the engine facade end to end

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use serde_json::json;

    use stockledger_core::{BatchId, BinLocationId, GoodsReceiptId, OrderId, ProductId, StockContainerId, WarehouseId};
    use stockledger_stock::{
        Batch, BatchQuantities, BinLocation, FifoPickingStrategy, InventorySnapshot, NewStockMovement,
        PickingStrategy, Product, ProductQuantity, SpecialLocation, StockArea, StockFilter,
        StockKey, StockLocationReference, StockMovement, Warehouse,
    };

    use crate::config::LedgerConfig;
    use crate::engine::{MovementSubmission, ReconciliationMode, ReconciliationRequest, StockEngine};
    use crate::ledger::{ApplyOptions, LedgerError, StockMovementService};
    use crate::reconciliation::{AvailableStockWriter, TotalStockWriter};
    use crate::store::{InMemoryStockStore, StockReader, StockStore, StockTransaction};
    use crate::transaction::RetryPolicy;

    struct World {
        ledger: Arc<StockMovementService<InMemoryStockStore>>,
        product: ProductId,
        warehouse: WarehouseId,
        bin: BinLocationId,
    }

    impl World {
        fn store(&self) -> &InMemoryStockStore {
            self.ledger.store()
        }

        fn quantity(&self, location: StockLocationReference) -> i64 {
            self.store().quantity_at(self.product, location).unwrap()
        }

        fn warehouse_location(&self) -> StockLocationReference {
            StockLocationReference::warehouse(self.warehouse)
        }

        fn bin_location(&self) -> StockLocationReference {
            StockLocationReference::bin_location(self.bin)
        }

        fn seed(&self, location: StockLocationReference, quantity: i64) {
            self.ledger
                .apply_movements(
                    &[StockMovement::between(
                        self.product,
                        quantity,
                        StockLocationReference::special(SpecialLocation::Initialization),
                        location,
                    )
                    .unwrap()],
                    ApplyOptions::default(),
                )
                .unwrap();
        }
    }

    fn setup_with(config: LedgerConfig) -> World {
        stockledger_observability::init();

        let store = InMemoryStockStore::from_config(&config);
        let product = ProductId::new();
        let warehouse = Warehouse::new(WarehouseId::new(), "main", Utc::now()).as_default();
        let bin = BinLocation::new(BinLocationId::new(), warehouse.id, "A-01");
        store.add_product(Product::new(product, "P-100").with_batch_management()).unwrap();
        store.add_warehouse(warehouse.clone()).unwrap();
        store.add_bin_location(bin.clone()).unwrap();

        World {
            ledger: Arc::new(StockMovementService::new(store, config)),
            product,
            warehouse: warehouse.id,
            bin: bin.id,
        }
    }

    fn setup() -> World {
        setup_with(LedgerConfig {
            retry: RetryPolicy::immediate(5),
            ..LedgerConfig::default()
        })
    }

    #[test]
    fn moving_stock_into_a_bin_location() {
        let world = setup();
        world.seed(world.warehouse_location(), 10);

        world
            .ledger
            .apply_movements(
                &[StockMovement::between(world.product, 3, world.warehouse_location(), world.bin_location()).unwrap()],
                ApplyOptions::default(),
            )
            .unwrap();

        assert_eq!(world.quantity(world.warehouse_location()), 7);
        assert_eq!(world.quantity(world.bin_location()), 3);
        assert_eq!(world.store().warehouse_stock(world.product, world.warehouse).unwrap(), 10);
    }

    #[test]
    fn overdrawing_a_warehouse_fails_and_leaves_stock_unchanged() {
        let world = setup();
        world.seed(world.warehouse_location(), 5);
        let committed = world.store().movement_count().unwrap();

        let err = world
            .ledger
            .apply_movements(
                &[StockMovement::between(world.product, 8, world.warehouse_location(), StockLocationReference::unknown())
                    .unwrap()],
                ApplyOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::NegativeStock { .. }));
        assert_eq!(world.quantity(world.warehouse_location()), 5);
        assert_eq!(world.store().movement_count().unwrap(), committed);
        assert_eq!(world.store().product_stock(world.product).unwrap().unwrap().physical_stock, 5);
    }

    #[test]
    fn override_allows_negative_stock() {
        let world = setup();
        world.seed(world.warehouse_location(), 5);

        world
            .ledger
            .apply_movements(
                &[StockMovement::between(world.product, 8, world.warehouse_location(), StockLocationReference::unknown())
                    .unwrap()],
                ApplyOptions::allowing_negative_stocks(),
            )
            .unwrap();

        assert_eq!(world.quantity(world.warehouse_location()), -3);
    }

    #[test]
    fn override_does_not_leak_into_other_calls() {
        let world = setup();
        world.seed(world.warehouse_location(), 1);
        let overdraw = || {
            StockMovement::between(world.product, 2, world.warehouse_location(), StockLocationReference::unknown())
                .unwrap()
        };

        world
            .ledger
            .apply_movements(&[overdraw()], ApplyOptions::allowing_negative_stocks())
            .unwrap();
        let err = world
            .ledger
            .apply_movements(&[overdraw()], ApplyOptions::default())
            .unwrap_err();

        assert!(matches!(err, LedgerError::NegativeStock { .. }));
        assert_eq!(world.quantity(world.warehouse_location()), -1);
    }

    #[test]
    fn available_stock_increase_creates_one_stocking_movement() {
        let world = setup();
        let outlet = Warehouse::new(WarehouseId::new(), "outlet", Utc::now() - Duration::days(2));
        world.store().add_warehouse(outlet.clone()).unwrap();
        world.seed(StockLocationReference::warehouse(outlet.id), 12);

        let writer = AvailableStockWriter::new(Arc::clone(&world.ledger));
        let receipt = writer
            .set_available_stocks(&BTreeMap::from([(world.product, 20)]), ApplyOptions::default())
            .unwrap();

        assert_eq!(receipt.movement_ids.len(), 1);
        let movement = world
            .store()
            .movements_for_product(world.product)
            .unwrap()
            .into_iter()
            .last()
            .unwrap();
        assert_eq!(movement.quantity(), 8);
        assert_eq!(*movement.destination(), world.warehouse_location());
        assert!(movement.source().is_special(SpecialLocation::ProductAvailableStockChange));
    }

    #[test]
    fn picking_reports_partial_solution_on_shortage() {
        let world = setup();
        world.seed(world.bin_location(), 4);
        world.seed(world.warehouse_location(), 2);

        let inventory = InventorySnapshot::new(
            world.store().warehouses().unwrap(),
            world.store().products(&[world.product]).unwrap(),
            world.store().stocks(&StockFilter::for_products([world.product])).unwrap(),
        );
        let err = FifoPickingStrategy
            .calculate_picking_solution(&[ProductQuantity::new(world.product, 10)], &StockArea::everywhere(), &inventory)
            .unwrap_err();

        let stockledger_stock::AllocationError::StockShortage(shortage) = err else {
            panic!("expected stock shortage");
        };
        let picked: i64 = shortage.partial_solution.iter().map(|p| p.quantity).sum();
        assert_eq!(picked, 6);
        assert_eq!(shortage.shortage_of(world.product), 4);
    }

    #[test]
    fn a_failing_movement_rolls_back_the_whole_batch() {
        let world = setup();
        world.seed(world.warehouse_location(), 5);
        let order = StockLocationReference::order(OrderId::new());

        let err = world
            .ledger
            .apply_movements(
                &[
                    StockMovement::between(world.product, 2, world.warehouse_location(), order).unwrap(),
                    StockMovement::between(world.product, 9, world.bin_location(), order).unwrap(),
                ],
                ApplyOptions::default(),
            )
            .unwrap_err();

        let LedgerError::NegativeStock { violations } = err else {
            panic!("expected negative stock");
        };
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].location, world.bin_location());
        assert_eq!(world.quantity(world.warehouse_location()), 5);
        assert_eq!(world.quantity(order), 0);
    }

    #[test]
    fn combination_errors_are_rejected_before_any_lock() {
        let world = setup_with(LedgerConfig {
            retry: RetryPolicy::immediate(1),
            lock_timeout: std::time::Duration::from_millis(10),
        });
        world.seed(world.warehouse_location(), 5);
        let receipt = StockLocationReference::goods_receipt(GoodsReceiptId::new());

        // Hold the warehouse row lock; a validation failure must not wait for it.
        let mut holder = world.store().begin().unwrap();
        holder
            .lock_stocks(&[StockKey::new(world.product, world.warehouse_location())])
            .unwrap();

        let err = world
            .ledger
            .apply_movements(
                &[StockMovement::between(world.product, 1, StockLocationReference::order(OrderId::new()), receipt)
                    .unwrap()],
                ApplyOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.code(), "STOCK_LEDGER__INVALID_LOCATION_COMBINATION");
        drop(holder);
    }

    #[test]
    fn non_stock_managed_products_cannot_enter_bins() {
        let world = setup();
        let service_product = ProductId::new();
        world
            .store()
            .add_product(Product::new(service_product, "SERVICE").without_stock_management())
            .unwrap();

        let err = world
            .ledger
            .apply_movements(
                &[
                    StockMovement::between(service_product, 1, StockLocationReference::unknown(), world.bin_location())
                        .unwrap(),
                    StockMovement::between(world.product, 1, StockLocationReference::unknown(), world.bin_location())
                        .unwrap(),
                ],
                ApplyOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err, LedgerError::NonStockManagedProduct { product_ids: vec![service_product] });
        assert_eq!(world.quantity(world.bin_location()), 0);
    }

    #[test]
    fn transient_commit_failures_are_retried() {
        let world = setup();
        world.store().fail_next_commits(2).unwrap();

        world.seed(world.warehouse_location(), 3);

        assert_eq!(world.quantity(world.warehouse_location()), 3);
        assert_eq!(world.store().movement_count().unwrap(), 1);
    }

    #[test]
    fn exhausted_retries_surface_as_terminal_error() {
        let world = setup_with(LedgerConfig {
            retry: RetryPolicy::immediate(3),
            ..LedgerConfig::default()
        });
        world.store().fail_next_commits(3).unwrap();

        let err = world
            .ledger
            .apply_movements(
                &[StockMovement::between(
                    world.product,
                    1,
                    StockLocationReference::unknown(),
                    world.warehouse_location(),
                )
                .unwrap()],
                ApplyOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(world.store().movement_count().unwrap(), 0);
    }

    #[test]
    fn concurrent_withdrawals_never_overdraw_a_row() {
        let world = setup();
        world.seed(world.warehouse_location(), 10);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&world.ledger);
                let product = world.product;
                let source = world.warehouse_location();
                thread::spawn(move || {
                    ledger.apply_movements(
                        &[StockMovement::between(product, 3, source, StockLocationReference::unknown()).unwrap()],
                        ApplyOptions::default(),
                    )
                })
            })
            .collect();

        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|result| result.is_ok())
            .count();

        assert_eq!(succeeded, 3);
        assert_eq!(world.quantity(world.warehouse_location()), 1);
    }

    #[test]
    fn batch_tracked_stock_is_picked_earliest_batch_first() {
        let world = setup();
        let now = Utc::now();
        let early = Batch::new(BatchId::new(), world.product, "L-1", now - Duration::days(3));
        let late = Batch::new(BatchId::new(), world.product, "L-2", now);
        world.store().add_batch(late.clone()).unwrap();
        world.store().add_batch(early.clone()).unwrap();

        world
            .ledger
            .create_and_apply(
                vec![
                    NewStockMovement::new(world.product, 5, StockLocationReference::unknown(), world.warehouse_location())
                        .with_batches(BatchQuantities::from_pairs([(late.id, 3), (early.id, 2)])),
                ],
                ApplyOptions::default(),
            )
            .unwrap();

        let writer = TotalStockWriter::new(Arc::clone(&world.ledger));
        writer
            .set_total_stocks(&BTreeMap::from([(world.product, 2)]), ApplyOptions::default())
            .unwrap();

        assert_eq!(world.store().batch_stock(world.product, early.id).unwrap(), 0);
        assert_eq!(world.store().batch_stock(world.product, late.id).unwrap(), 2);
    }

    #[test]
    fn containers_and_goods_receipts_count_toward_their_warehouse() {
        let world = setup();
        let container = StockContainerId::new();
        let receipt = GoodsReceiptId::new();
        world.store().register_stock_container(container, world.warehouse).unwrap();
        world.store().register_goods_receipt(receipt, world.warehouse).unwrap();

        world.seed(StockLocationReference::goods_receipt(receipt), 4);
        world
            .ledger
            .apply_movements(
                &[StockMovement::between(
                    world.product,
                    4,
                    StockLocationReference::goods_receipt(receipt),
                    StockLocationReference::stock_container(container),
                )
                .unwrap()],
                ApplyOptions::default(),
            )
            .unwrap();

        assert_eq!(world.store().warehouse_stock(world.product, world.warehouse).unwrap(), 4);
        assert_eq!(world.quantity(StockLocationReference::stock_container(container)), 4);
    }

    #[test]
    fn engine_round_trip_through_json() {
        stockledger_observability::init();
        let store = InMemoryStockStore::new();
        let product = ProductId::new();
        let warehouse = Warehouse::new(WarehouseId::new(), "main", Utc::now()).as_default();
        store.add_product(Product::new(product, "P-1")).unwrap();
        store.add_warehouse(warehouse.clone()).unwrap();
        let engine = StockEngine::new(store, LedgerConfig::default());

        let order = OrderId::new();
        let receipt = engine
            .submit_movements(MovementSubmission {
                movements: vec![NewStockMovement::new(
                    product,
                    5,
                    StockLocationReference::unknown(),
                    StockLocationReference::warehouse(warehouse.id),
                )],
                allow_negative_stocks: false,
            })
            .unwrap();
        assert_eq!(receipt.movement_ids.len(), 1);

        let payload = json!({
            "movements": [{
                "productId": product,
                "quantity": -2,
                "source": { "order": { "id": order } },
                "destination": { "warehouse": { "id": warehouse.id } }
            }]
        });
        engine.submit_movements_json(&payload.to_string()).unwrap();
        assert_eq!(
            engine.store().quantity_at(product, StockLocationReference::order(order)).unwrap(),
            2
        );

        let receipt = engine
            .reconcile(ReconciliationRequest {
                mode: ReconciliationMode::Available,
                quantities: BTreeMap::from([(product, 10)]),
                allow_negative_stocks: false,
            })
            .unwrap();
        assert_eq!(receipt.aggregates.product(product).unwrap().available_stock, 10);

        let serialized = serde_json::to_value(&receipt).unwrap();
        assert_eq!(serialized["aggregates"]["products"][0]["availableStock"], 10);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: every balance equals incoming minus outgoing ledger quantities.
        #[test]
        fn balances_follow_the_ledger(
            steps in prop::collection::vec((0usize..3, 0usize..3, -20i64..20), 1..20),
        ) {
            let world = setup();
            let locations = [
                world.warehouse_location(),
                world.bin_location(),
                StockLocationReference::unknown(),
            ];

            for (from, to, quantity) in steps {
                let Ok(movement) = StockMovement::between(world.product, quantity, locations[from], locations[to]) else {
                    continue;
                };
                let _ = world.ledger.apply_movements(&[movement], ApplyOptions::default());
            }

            let ledger = world.store().movements_for_product(world.product).unwrap();
            for location in locations {
                let expected: i64 = ledger.iter().map(|m| m.delta_at(&location)).sum();
                prop_assert_eq!(world.quantity(location), expected);
                if location.is_internal() {
                    prop_assert!(world.quantity(location) >= 0);
                }
            }
        }
    }
}
