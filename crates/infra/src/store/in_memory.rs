use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use stockledger_core::{BatchId, BinLocationId, Entity, GoodsReceiptId, ProductId, StockContainerId, WarehouseId};
use stockledger_stock::{
    Batch, BinLocation, Product, Stock, StockFilter, StockKey, StockLocationReference, StockMovement,
    Warehouse,
};
use tracing::debug;

use crate::config::LedgerConfig;
use crate::projections::{AggregateSnapshot, ProductStockSummary, rollup};

use super::r#trait::{CommitReceipt, StockReader, StockStore, StockTransaction, StoreError};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Master data the store resolves locations against.
#[derive(Debug, Default)]
struct Catalog {
    products: BTreeMap<ProductId, Product>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    bin_locations: BTreeMap<BinLocationId, BinLocation>,
    batches: BTreeMap<BatchId, Batch>,
    stock_containers: BTreeMap<StockContainerId, WarehouseId>,
    goods_receipts: BTreeMap<GoodsReceiptId, WarehouseId>,
}

impl Catalog {
    /// Warehouse owning an internal location, if any.
    fn owner_of(&self, location: &StockLocationReference) -> Option<WarehouseId> {
        match location {
            StockLocationReference::Warehouse(id) => Some(*id),
            StockLocationReference::BinLocation(id) => self.bin_locations.get(id).map(|b| b.warehouse_id),
            StockLocationReference::StockContainer(id) => self.stock_containers.get(id).copied(),
            StockLocationReference::GoodsReceipt(id) => self.goods_receipts.get(id).copied(),
            StockLocationReference::Order { .. }
            | StockLocationReference::ReturnOrder { .. }
            | StockLocationReference::SpecialLocation(_) => None,
        }
    }

    fn location_name(&self, location: &StockLocationReference) -> Option<String> {
        match location {
            StockLocationReference::Warehouse(id) => self.warehouses.get(id).map(|w| w.code.clone()),
            StockLocationReference::BinLocation(id) => self.bin_locations.get(id).map(|bin| {
                match self.warehouses.get(&bin.warehouse_id) {
                    Some(warehouse) => format!("{}/{}", warehouse.code, bin.code),
                    None => bin.code.clone(),
                }
            }),
            StockLocationReference::SpecialLocation(special) => Some(special.technical_name().to_string()),
            StockLocationReference::Order { .. }
            | StockLocationReference::ReturnOrder { .. }
            | StockLocationReference::StockContainer(_)
            | StockLocationReference::GoodsReceipt(_) => None,
        }
    }

    fn is_batch_managed(&self, product_id: ProductId) -> bool {
        self.products.get(&product_id).is_some_and(|p| p.batch_managed)
    }

    /// Earliest-created batches first; unknown batches last.
    fn batch_order(&self, batch_id: BatchId) -> (bool, Option<chrono::DateTime<chrono::Utc>>, BatchId) {
        let created_at = self.batches.get(&batch_id).map(|b| b.created_at);
        (created_at.is_none(), created_at, batch_id)
    }
}

#[derive(Debug, Default)]
struct StoreState {
    catalog: Catalog,
    stocks: BTreeMap<StockKey, Stock>,
    movements: Vec<StockMovement>,
    next_sequence: u64,
    aggregates: BTreeMap<ProductId, AggregateSnapshot>,
}

impl StoreState {
    fn product_rows(&self, product_id: ProductId) -> Vec<Stock> {
        self.stocks
            .values()
            .filter(|s| s.product_id == product_id)
            .cloned()
            .collect()
    }

    fn compute_aggregates(&self, product_id: ProductId, rows: &[Stock]) -> AggregateSnapshot {
        match self.catalog.products.get(&product_id) {
            Some(product) => rollup(product, rows, &self.catalog.warehouses),
            None => AggregateSnapshot::default(),
        }
    }

    fn refresh(&mut self, product_id: ProductId) -> AggregateSnapshot {
        let rows = self.product_rows(product_id);
        let snapshot = self.compute_aggregates(product_id, &rows);
        self.aggregates.insert(product_id, snapshot.clone());
        snapshot
    }
}

/// Apply one movement to a set of stock rows: `-quantity` at the source,
/// `+quantity` at the destination. Missing rows are created on first touch.
///
/// Batch breakdowns are booked only for batch-managed products. An outflow
/// without a breakdown takes untracked units first; once the row drops below
/// its tracked total the breakdown is drained earliest batch first, so the
/// tracked portion never exceeds the row balance.
fn book(
    rows: &mut BTreeMap<StockKey, Stock>,
    catalog: &Catalog,
    next_sequence: &mut u64,
    movement: &StockMovement,
) {
    let batches = movement.batches().filter(|_| catalog.is_batch_managed(movement.product_id()));
    let legs = [(*movement.source(), -1i64), (*movement.destination(), 1i64)];
    for (location, sign) in legs {
        let key = StockKey::new(movement.product_id(), location);
        let row = rows.entry(key).or_insert_with(|| {
            let sequence = *next_sequence;
            *next_sequence += 1;
            Stock::empty(key.product_id, location, catalog.owner_of(&location), sequence)
        });
        row.quantity += sign * movement.quantity();
        match batches {
            Some(batches) => {
                for entry in batches.iter() {
                    row.batches.add(entry.batch_id, sign * entry.quantity);
                }
                row.batches.sort_by_key(|entry| catalog.batch_order(entry.batch_id));
            }
            None if sign < 0 => {
                let excess = row.batches.positive_total() - row.quantity.max(0);
                if excess > 0 {
                    row.batches.consume_in_order(excess);
                }
            }
            None => {}
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LockKey {
    Product(ProductId),
    Stock(StockKey),
}

impl core::fmt::Display for LockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LockKey::Product(id) => write!(f, "product {id}"),
            LockKey::Stock(key) => write!(f, "stock {key}"),
        }
    }
}

/// Exclusive row locks keyed by `LockKey`, owned by transaction ids.
#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashMap<LockKey, u64>>,
    released: Condvar,
}

impl LockTable {
    /// Returns `true` if the lock was newly acquired, `false` if `owner` already held it.
    fn acquire(&self, owner: u64, key: LockKey, timeout: Duration) -> Result<bool, StoreError> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        loop {
            match held.get(&key) {
                None => {
                    held.insert(key, owner);
                    return Ok(true);
                }
                Some(current) if *current == owner => return Ok(false),
                Some(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::LockTimeout(format!("{key} is locked by another transaction")));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| StoreError::Poisoned)?;
            held = guard;
        }
    }

    fn release(&self, owner: u64, keys: &[LockKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if held.get(key) == Some(&owner) {
                held.remove(key);
            }
        }
        self.released.notify_all();
    }
}

/// In-memory transactional stock store.
///
/// Intended for tests/dev. Row locks block the calling thread (with a timeout
/// surfacing as a transient `LockTimeout`), writes are buffered per transaction
/// and applied atomically on commit.
#[derive(Debug)]
pub struct InMemoryStockStore {
    state: RwLock<StoreState>,
    locks: LockTable,
    next_transaction: AtomicU64,
    injected_failures: Mutex<u32>,
    lock_timeout: Duration,
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            locks: LockTable::default(),
            next_transaction: AtomicU64::new(1),
            injected_failures: Mutex::new(0),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store honouring the configured lock wait timeout.
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new().with_lock_timeout(config.lock_timeout)
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    pub fn add_product(&self, product: Product) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.products.insert(product.id, product);
        Ok(())
    }

    pub fn add_warehouse(&self, warehouse: Warehouse) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.warehouses.insert(warehouse.id, warehouse);
        Ok(())
    }

    pub fn add_bin_location(&self, bin_location: BinLocation) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.bin_locations.insert(bin_location.id, bin_location);
        Ok(())
    }

    pub fn add_batch(&self, batch: Batch) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.batches.insert(batch.id, batch);
        Ok(())
    }

    pub fn register_stock_container(&self, id: StockContainerId, warehouse_id: WarehouseId) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.stock_containers.insert(id, warehouse_id);
        Ok(())
    }

    pub fn register_goods_receipt(&self, id: GoodsReceiptId, warehouse_id: WarehouseId) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        state.catalog.goods_receipts.insert(id, warehouse_id);
        Ok(())
    }

    /// Record units reserved by open orders and refresh the product's aggregates.
    pub fn set_reserved_stock(&self, product_id: ProductId, reserved_stock: i64) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        let Some(product) = state.catalog.products.get_mut(&product_id) else {
            return Err(StoreError::Backend(format!("unknown product {product_id}")));
        };
        product.reserved_stock = reserved_stock;
        state.refresh(product_id);
        Ok(())
    }

    /// Fail the next `count` commits with a transient serialization failure.
    pub fn fail_next_commits(&self, count: u32) -> Result<(), StoreError> {
        let mut failures = self.injected_failures.lock().map_err(|_| StoreError::Poisoned)?;
        *failures = count;
        Ok(())
    }

    /// Committed balance of a product at a location (0 if the row does not exist).
    pub fn quantity_at(&self, product_id: ProductId, location: StockLocationReference) -> Result<i64, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .stocks
            .get(&StockKey::new(product_id, location))
            .map(|s| s.quantity)
            .unwrap_or(0))
    }

    /// The committed ledger of a product, in commit order.
    pub fn movements_for_product(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.read_state()?;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.product_id() == product_id)
            .cloned()
            .collect())
    }

    pub fn movement_count(&self) -> Result<usize, StoreError> {
        Ok(self.read_state()?.movements.len())
    }

    /// Last committed aggregates of a product (computed on the fly if it was never touched).
    pub fn aggregates(&self, product_id: ProductId) -> Result<AggregateSnapshot, StoreError> {
        let state = self.read_state()?;
        if let Some(snapshot) = state.aggregates.get(&product_id) {
            return Ok(snapshot.clone());
        }
        let rows = state.product_rows(product_id);
        Ok(state.compute_aggregates(product_id, &rows))
    }

    pub fn product_stock(&self, product_id: ProductId) -> Result<Option<ProductStockSummary>, StoreError> {
        Ok(self.aggregates(product_id)?.product(product_id).copied())
    }

    pub fn warehouse_stock(&self, product_id: ProductId, warehouse_id: WarehouseId) -> Result<i64, StoreError> {
        Ok(self
            .aggregates(product_id)?
            .warehouses
            .iter()
            .filter(|w| w.warehouse_id == warehouse_id)
            .map(|w| w.quantity)
            .sum())
    }

    pub fn batch_stock(&self, product_id: ProductId, batch_id: BatchId) -> Result<i64, StoreError> {
        Ok(self
            .aggregates(product_id)?
            .batches
            .iter()
            .filter(|b| b.batch_id == batch_id)
            .map(|b| b.physical_stock)
            .sum())
    }
}

fn select_products(catalog: &Catalog, product_ids: &[ProductId]) -> Vec<Product> {
    product_ids
        .iter()
        .filter_map(|id| catalog.products.get(id).cloned())
        .collect()
}

impl StockReader for InMemoryStockStore {
    fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(select_products(&self.read_state()?.catalog, product_ids))
    }

    fn warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        Ok(self.read_state()?.catalog.warehouses.values().cloned().collect())
    }

    fn stocks(&self, filter: &StockFilter) -> Result<Vec<Stock>, StoreError> {
        let state = self.read_state()?;
        Ok(state.stocks.values().filter(|s| filter.matches(s)).cloned().collect())
    }

    fn stock(&self, key: &StockKey) -> Result<Option<Stock>, StoreError> {
        Ok(self.read_state()?.stocks.get(key).cloned())
    }

    fn location_name(&self, location: &StockLocationReference) -> Result<Option<String>, StoreError> {
        Ok(self.read_state()?.catalog.location_name(location))
    }
}

impl StockStore for InMemoryStockStore {
    fn begin(&self) -> Result<Box<dyn StockTransaction + '_>, StoreError> {
        let id = self.next_transaction.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(InMemoryTransaction {
            store: self,
            id,
            held: Vec::new(),
            pending: Vec::new(),
            touched: BTreeSet::new(),
        }))
    }
}

/// Buffered unit of work. Reads overlay pending movements on committed rows.
struct InMemoryTransaction<'a> {
    store: &'a InMemoryStockStore,
    id: u64,
    held: Vec<LockKey>,
    pending: Vec<StockMovement>,
    touched: BTreeSet<ProductId>,
}

impl InMemoryTransaction<'_> {
    fn lock_all(&mut self, mut keys: Vec<LockKey>) -> Result<(), StoreError> {
        keys.sort();
        keys.dedup();
        for key in keys {
            if self.store.locks.acquire(self.id, key, self.store.lock_timeout)? {
                self.held.push(key);
            }
        }
        Ok(())
    }

    /// Committed rows of the selected products with this transaction's pending
    /// movements applied.
    fn overlay(&self, products: Option<&BTreeSet<ProductId>>) -> Result<BTreeMap<StockKey, Stock>, StoreError> {
        let state = self.store.read_state()?;
        let wanted = |product_id: ProductId| products.is_none_or(|set| set.contains(&product_id));

        let mut rows: BTreeMap<StockKey, Stock> = state
            .stocks
            .iter()
            .filter(|(key, _)| wanted(key.product_id))
            .map(|(key, stock)| (*key, stock.clone()))
            .collect();
        let mut next_sequence = state.next_sequence;
        for movement in self.pending.iter().filter(|m| wanted(m.product_id())) {
            book(&mut rows, &state.catalog, &mut next_sequence, movement);
        }
        Ok(rows)
    }
}

impl StockReader for InMemoryTransaction<'_> {
    fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        self.store.products(product_ids)
    }

    fn warehouses(&self) -> Result<Vec<Warehouse>, StoreError> {
        self.store.warehouses()
    }

    fn stocks(&self, filter: &StockFilter) -> Result<Vec<Stock>, StoreError> {
        Ok(self
            .overlay(filter.products.as_ref())?
            .into_values()
            .filter(|s| filter.matches(s))
            .collect())
    }

    fn stock(&self, key: &StockKey) -> Result<Option<Stock>, StoreError> {
        let product = BTreeSet::from([key.product_id]);
        Ok(self.overlay(Some(&product))?.remove(key))
    }

    fn location_name(&self, location: &StockLocationReference) -> Result<Option<String>, StoreError> {
        self.store.location_name(location)
    }
}

impl StockTransaction for InMemoryTransaction<'_> {
    fn lock_products(&mut self, product_ids: &[ProductId]) -> Result<(), StoreError> {
        self.lock_all(product_ids.iter().copied().map(LockKey::Product).collect())
    }

    fn lock_stocks(&mut self, keys: &[StockKey]) -> Result<(), StoreError> {
        self.lock_all(keys.iter().copied().map(LockKey::Stock).collect())
    }

    fn insert_movements(&mut self, movements: &[StockMovement]) -> Result<(), StoreError> {
        self.touched.extend(movements.iter().map(StockMovement::product_id));
        self.pending.extend_from_slice(movements);
        Ok(())
    }

    fn refresh_aggregates(&mut self, product_ids: &[ProductId]) -> Result<AggregateSnapshot, StoreError> {
        self.touched.extend(product_ids.iter().copied());
        let selected: BTreeSet<ProductId> = product_ids.iter().copied().collect();
        let rows: Vec<Stock> = self.overlay(Some(&selected))?.into_values().collect();

        let state = self.store.read_state()?;
        let mut snapshot = AggregateSnapshot::default();
        for product_id in selected {
            let product_rows: Vec<Stock> = rows.iter().filter(|s| s.product_id == product_id).cloned().collect();
            snapshot.extend(state.compute_aggregates(product_id, &product_rows));
        }
        Ok(snapshot)
    }

    fn commit(mut self: Box<Self>) -> Result<CommitReceipt, StoreError> {
        {
            let mut failures = self.store.injected_failures.lock().map_err(|_| StoreError::Poisoned)?;
            if *failures > 0 {
                *failures -= 1;
                return Err(StoreError::SerializationFailure(format!(
                    "could not serialize access (transaction {})",
                    self.id
                )));
            }
        }

        let pending = std::mem::take(&mut self.pending);
        let touched = std::mem::take(&mut self.touched);

        let mut state = self.store.write_state()?;
        {
            let StoreState {
                catalog,
                stocks,
                next_sequence,
                ..
            } = &mut *state;
            for movement in &pending {
                book(stocks, catalog, next_sequence, movement);
            }
        }

        let mut receipt = CommitReceipt {
            movement_ids: pending.iter().map(Entity::id).collect(),
            aggregates: AggregateSnapshot::default(),
        };
        state.movements.extend(pending);
        for product_id in touched {
            receipt.aggregates.extend(state.refresh(product_id));
        }

        debug!(
            transaction = self.id,
            movements = receipt.movement_ids.len(),
            "stock transaction committed"
        );
        Ok(receipt)
    }
}

impl Drop for InMemoryTransaction<'_> {
    fn drop(&mut self) {
        self.store.locks.release(self.id, &self.held);
    }
}
