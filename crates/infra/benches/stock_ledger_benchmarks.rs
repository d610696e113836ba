use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use stockledger_core::{BatchId, BinLocationId, ProductId, WarehouseId};
use stockledger_infra::{ApplyOptions, InMemoryStockStore, LedgerConfig, StockMovementService};
use stockledger_stock::{
    BatchQuantities, FifoPickingStrategy, InventorySnapshot, PickingStrategy, Product, ProductQuantity,
    SpecialLocation, Stock, StockArea, StockLocationReference, StockMovement, Warehouse,
};

/// Inventory with `rows` bin rows of 5 units spread over 4 warehouses.
fn inventory(product: ProductId, rows: usize) -> InventorySnapshot {
    let now = Utc::now();
    let warehouses: Vec<Warehouse> = (0..4)
        .map(|i| Warehouse::new(WarehouseId::new(), format!("w{i}"), now - Duration::days(i)))
        .collect();
    let stocks = (0..rows).map(|i| {
        let warehouse = &warehouses[i % warehouses.len()];
        let mut stock = Stock::empty(
            product,
            StockLocationReference::bin_location(BinLocationId::new()),
            Some(warehouse.id),
            i as u64,
        );
        stock.quantity = 5;
        if i % 2 == 0 {
            stock.batches = BatchQuantities::from_pairs([(BatchId::new(), 3)]);
        }
        stock
    });
    InventorySnapshot::new(
        warehouses.clone(),
        [Product::new(product, "P-1").with_batch_management()],
        stocks,
    )
}

fn bench_picking(c: &mut Criterion) {
    let mut group = c.benchmark_group("picking");

    for rows in [10usize, 100, 1_000] {
        let product = ProductId::new();
        let inventory = inventory(product, rows);
        let need = [ProductQuantity::new(product, (rows as i64 * 5) / 2)];
        let area = StockArea::everywhere();

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("fifo_half_of_stock", rows), &rows, |b, _| {
            b.iter(|| {
                let solution = FifoPickingStrategy
                    .calculate_picking_solution(black_box(&need), &area, &inventory)
                    .unwrap();
                black_box(solution);
            });
        });
    }

    group.finish();
}

fn bench_apply_movements(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_movements");

    for batch_size in [1usize, 10, 100] {
        let store = InMemoryStockStore::new();
        let product = ProductId::new();
        let warehouse = Warehouse::new(WarehouseId::new(), "main", Utc::now()).as_default();
        store.add_product(Product::new(product, "P-1")).unwrap();
        store.add_warehouse(warehouse.clone()).unwrap();
        let service = StockMovementService::new(store, LedgerConfig::default());

        let source = StockLocationReference::special(SpecialLocation::Import);
        let destination = StockLocationReference::warehouse(warehouse.id);

        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(BenchmarkId::new("receipts", batch_size), &batch_size, |b, &size| {
            b.iter(|| {
                let movements: Vec<StockMovement> = (0..size)
                    .map(|_| StockMovement::between(product, 1, source, destination).unwrap())
                    .collect();
                service.apply_movements(black_box(&movements), ApplyOptions::default()).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_picking, bench_apply_movements);
criterion_main!(benches);
