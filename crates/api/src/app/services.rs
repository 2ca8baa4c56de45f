//! Application services: infrastructure wiring shared by all handlers.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use uuid::Uuid;

use depot_catalog::{
    Category, CategoryCommand, Product, ProductCommand, Supplier, SupplierCommand, Warehouse,
    WarehouseCommand,
};
use depot_core::{AggregateId, CategoryId, FundAccountId, ProductId, SupplierId, WarehouseId};
use depot_events::{EventBus, EventEnvelope, InMemoryEventBus};
use depot_funds::{FundAccount, FundCommand};
use depot_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use depot_infra::event_store::{EventStore, StoredEvent};
use depot_infra::projections::catalog::{
    CategoryDirectory, CategoryReadModel, ProductDirectory, ProductReadModel, SupplierDirectory,
    SupplierReadModel, WarehouseDirectory, WarehouseReadModel,
};
use depot_infra::projections::fund_balances::{
    FundAccountReadModel, FundBalancesProjection, VoucherReadModel,
};
use depot_infra::projections::movement_log::{MovementLogProjection, MovementRecord};
use depot_infra::projections::stock_levels::{StockLevel, StockLevelsProjection};
use depot_infra::read_model::InMemoryReadModelStore;
use depot_inventory::{LedgerCommand, LedgerId, StockKey, StockLedger};

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

pub type LedgerDispatcher =
    CommandDispatcher<Arc<dyn EventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

pub type StockLevels = StockLevelsProjection<Arc<InMemoryReadModelStore<StockKey, StockLevel>>>;
pub type MovementLog = MovementLogProjection<Arc<InMemoryReadModelStore<Uuid, MovementRecord>>>;
pub type Products = ProductDirectory<Arc<InMemoryReadModelStore<ProductId, ProductReadModel>>>;
pub type Categories = CategoryDirectory<Arc<InMemoryReadModelStore<CategoryId, CategoryReadModel>>>;
pub type Warehouses =
    WarehouseDirectory<Arc<InMemoryReadModelStore<WarehouseId, WarehouseReadModel>>>;
pub type Suppliers = SupplierDirectory<Arc<InMemoryReadModelStore<SupplierId, SupplierReadModel>>>;
pub type FundBalances = FundBalancesProjection<
    Arc<InMemoryReadModelStore<FundAccountId, FundAccountReadModel>>,
    Arc<InMemoryReadModelStore<Uuid, VoucherReadModel>>,
>;

/// Everything a handler needs: the dispatcher and the read models.
pub struct AppServices {
    dispatcher: LedgerDispatcher,
    pub stock_levels: Arc<StockLevels>,
    pub movement_log: Arc<MovementLog>,
    pub products: Arc<Products>,
    pub categories: Arc<Categories>,
    pub warehouses: Arc<Warehouses>,
    pub suppliers: Arc<Suppliers>,
    pub funds: Arc<FundBalances>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    /// Dispatch a command onto the singleton stock-ledger stream.
    pub fn dispatch_ledger(&self, command: LedgerCommand) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<StockLedger>(
            LedgerId::global().0,
            "inventory.ledger",
            command,
            |id| StockLedger::empty(LedgerId::new(id)),
        )
    }

    pub fn dispatch_product(
        &self,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Product>(
            AggregateId::from_uuid(product_id.into()),
            "catalog.product",
            command,
            |_| Product::empty(product_id),
        )
    }

    pub fn dispatch_category(
        &self,
        category_id: CategoryId,
        command: CategoryCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Category>(
            AggregateId::from_uuid(category_id.into()),
            "catalog.category",
            command,
            |_| Category::empty(category_id),
        )
    }

    pub fn dispatch_warehouse(
        &self,
        warehouse_id: WarehouseId,
        command: WarehouseCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Warehouse>(
            AggregateId::from_uuid(warehouse_id.into()),
            "catalog.warehouse",
            command,
            |_| Warehouse::empty(warehouse_id),
        )
    }

    pub fn dispatch_supplier(
        &self,
        supplier_id: SupplierId,
        command: SupplierCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<Supplier>(
            AggregateId::from_uuid(supplier_id.into()),
            "catalog.supplier",
            command,
            |_| Supplier::empty(supplier_id),
        )
    }

    pub fn dispatch_fund(
        &self,
        account_id: FundAccountId,
        command: FundCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        self.dispatcher.dispatch::<FundAccount>(
            AggregateId::from_uuid(account_id.into()),
            "funds.account",
            command,
            |_| FundAccount::empty(account_id),
        )
    }
}

/// Wire up the store, bus, projections and the background subscriber that
/// feeds published envelopes into every read model.
pub fn build_services(store: Arc<dyn EventStore>) -> Arc<AppServices> {
    let bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>> = Arc::new(InMemoryEventBus::new());

    let stock_levels: Arc<StockLevels> =
        Arc::new(StockLevelsProjection::new(Arc::new(InMemoryReadModelStore::new())));
    let movement_log: Arc<MovementLog> =
        Arc::new(MovementLogProjection::new(Arc::new(InMemoryReadModelStore::new())));
    let products: Arc<Products> =
        Arc::new(ProductDirectory::new(Arc::new(InMemoryReadModelStore::new())));
    let categories: Arc<Categories> =
        Arc::new(CategoryDirectory::new(Arc::new(InMemoryReadModelStore::new())));
    let warehouses: Arc<Warehouses> =
        Arc::new(WarehouseDirectory::new(Arc::new(InMemoryReadModelStore::new())));
    let suppliers: Arc<Suppliers> =
        Arc::new(SupplierDirectory::new(Arc::new(InMemoryReadModelStore::new())));
    let funds: Arc<FundBalances> = Arc::new(FundBalancesProjection::new(
        Arc::new(InMemoryReadModelStore::new()),
        Arc::new(InMemoryReadModelStore::new()),
    ));

    // Realtime channel (SSE): lossy broadcast.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Catch up the read models with whatever the store already holds
    // (meaningful for persistent stores; a no-op for a fresh in-memory one).
    match store.load_all() {
        Ok(history) => {
            for stored in &history {
                apply_to_projections(
                    &stored.to_envelope(),
                    &stock_levels,
                    &movement_log,
                    &products,
                    &categories,
                    &warehouses,
                    &suppliers,
                    &funds,
                );
            }
        }
        Err(e) => tracing::warn!("failed to load event history for replay: {e}"),
    }

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let stock_levels = stock_levels.clone();
        let movement_log = movement_log.clone();
        let products = products.clone();
        let categories = categories.clone();
        let warehouses = warehouses.clone();
        let suppliers = suppliers.clone();
        let funds = funds.clone();
        let realtime_tx = realtime_tx.clone();

        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(envelope) => {
                        apply_to_projections(
                            &envelope,
                            &stock_levels,
                            &movement_log,
                            &products,
                            &categories,
                            &warehouses,
                            &suppliers,
                            &funds,
                        );

                        // Broadcast projection update (lossy; no backpressure on core).
                        let _ = realtime_tx.send(RealtimeMessage {
                            topic: "projection_updated".to_string(),
                            payload: serde_json::json!({
                                "aggregate_type": envelope.aggregate_type(),
                                "aggregate_id": envelope.aggregate_id().to_string(),
                                "sequence_number": envelope.sequence_number(),
                            }),
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let dispatcher: LedgerDispatcher = CommandDispatcher::new(store, bus);

    Arc::new(AppServices {
        dispatcher,
        stock_levels,
        movement_log,
        products,
        categories,
        warehouses,
        suppliers,
        funds,
        realtime_tx,
    })
}

#[allow(clippy::too_many_arguments)]
fn apply_to_projections(
    envelope: &EventEnvelope<JsonValue>,
    stock_levels: &StockLevels,
    movement_log: &MovementLog,
    products: &Products,
    categories: &Categories,
    warehouses: &Warehouses,
    suppliers: &Suppliers,
    funds: &FundBalances,
) {
    // The movement log goes first so that a listing observed at quantity N
    // always contains the movements that produced N.
    if let Err(e) = movement_log.apply_envelope(envelope) {
        tracing::warn!("movement log projection apply failed: {e}");
    }
    if let Err(e) = stock_levels.apply_envelope(envelope) {
        tracing::warn!("stock levels projection apply failed: {e}");
    }
    if let Err(e) = products.apply_envelope(envelope) {
        tracing::warn!("product directory apply failed: {e}");
    }
    if let Err(e) = categories.apply_envelope(envelope) {
        tracing::warn!("category directory apply failed: {e}");
    }
    if let Err(e) = warehouses.apply_envelope(envelope) {
        tracing::warn!("warehouse directory apply failed: {e}");
    }
    if let Err(e) = suppliers.apply_envelope(envelope) {
        tracing::warn!("supplier directory apply failed: {e}");
    }
    if let Err(e) = funds.apply_envelope(envelope) {
        tracing::warn!("fund balances projection apply failed: {e}");
    }
}
