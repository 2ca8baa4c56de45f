use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, Utc};
use uuid::Uuid;

use depot_core::{ProductId, SupplierId, WarehouseId};
use depot_events::{EventEnvelope, InMemoryEventBus};
use depot_infra::command_dispatcher::CommandDispatcher;
use depot_infra::event_store::InMemoryEventStore;
use depot_inventory::{
    ExportLine, ExportRecorded, ImportLine, ImportRecorded, LedgerCommand, LedgerEvent, LedgerId,
    RecordImport, StockLedger, reconstruct_levels,
};
use std::sync::Arc;

type Dispatcher = CommandDispatcher<
    InMemoryEventStore,
    Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>,
>;

fn setup_dispatcher() -> Dispatcher {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    CommandDispatcher::new(store, bus)
}

fn import_command(warehouse: WarehouseId, supplier: SupplierId, product: ProductId) -> LedgerCommand {
    LedgerCommand::RecordImport(RecordImport {
        ledger_id: LedgerId::global(),
        import_id: Uuid::now_v7(),
        warehouse_id: warehouse,
        supplier_id: supplier,
        lines: vec![ImportLine {
            product_id: product,
            quantity: 3,
            unit_price: 100,
        }],
        occurred_at: Utc::now(),
    })
}

fn bench_command_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_dispatch");
    group.sample_size(200);

    // First command against an empty stream: no history to rehydrate.
    group.bench_function("record_import_fresh", |b| {
        let warehouse = WarehouseId::new();
        let supplier = SupplierId::new();
        let product = ProductId::new();

        b.iter(|| {
            let dispatcher = setup_dispatcher();
            dispatcher
                .dispatch::<StockLedger>(
                    LedgerId::global().0,
                    "inventory.ledger",
                    black_box(import_command(warehouse, supplier, product)),
                    |id| StockLedger::empty(LedgerId::new(id)),
                )
                .unwrap();
        });
    });

    // Dispatch against a stream that already holds N movements: measures the
    // rehydration cost of the load-replay-decide pipeline.
    for history_len in [100u64, 1_000] {
        group.bench_with_input(
            BenchmarkId::new("record_import_with_history", history_len),
            &history_len,
            |b, &history_len| {
                let warehouse = WarehouseId::new();
                let supplier = SupplierId::new();
                let product = ProductId::new();

                let dispatcher = setup_dispatcher();
                for _ in 0..history_len {
                    dispatcher
                        .dispatch::<StockLedger>(
                            LedgerId::global().0,
                            "inventory.ledger",
                            import_command(warehouse, supplier, product),
                            |id| StockLedger::empty(LedgerId::new(id)),
                        )
                        .unwrap();
                }

                b.iter(|| {
                    dispatcher
                        .dispatch::<StockLedger>(
                            LedgerId::global().0,
                            "inventory.ledger",
                            black_box(import_command(warehouse, supplier, product)),
                            |id| StockLedger::empty(LedgerId::new(id)),
                        )
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn movement_history(len: usize) -> Vec<LedgerEvent> {
    let warehouse = WarehouseId::new();
    let supplier = SupplierId::new();
    let product = ProductId::new();
    let start = Utc::now() - Duration::days(len as i64);

    (0..len)
        .map(|i| {
            let occurred_at = start + Duration::hours(i as i64);
            if i % 3 == 0 {
                LedgerEvent::ExportRecorded(ExportRecorded {
                    export_id: Uuid::now_v7(),
                    warehouse_id: warehouse,
                    lines: vec![ExportLine {
                        product_id: product,
                        quantity: 1,
                    }],
                    occurred_at,
                })
            } else {
                LedgerEvent::ImportRecorded(ImportRecorded {
                    import_id: Uuid::now_v7(),
                    warehouse_id: warehouse,
                    supplier_id: supplier,
                    lines: vec![ImportLine {
                        product_id: product,
                        quantity: 2,
                        unit_price: 50,
                    }],
                    total_amount: 100,
                    occurred_at,
                })
            }
        })
        .collect()
}

fn bench_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruction");

    for len in [1_000usize, 10_000] {
        let events = movement_history(len);
        let as_of = Utc::now();

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("replay_events", len), &events, |b, events| {
            b.iter(|| black_box(reconstruct_levels(black_box(events), as_of, None)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_command_dispatch, bench_reconstruction);
criterion_main!(benches);
