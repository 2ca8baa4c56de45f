use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use depot_core::{AggregateId, SupplierId, WarehouseId};
use depot_events::{Event, EventEnvelope};
use depot_inventory::LedgerEvent;

use crate::read_model::ReadModelStore;

/// One movement as recorded on the ledger stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRecord {
    pub movement_id: Uuid,
    pub sequence_number: u64,
    pub occurred_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

/// Filter for movement listings. Date bounds are inclusive instants; the API
/// layer maps `YYYY-MM-DD` query strings onto start-of-day/end-of-day.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub supplier_id: Option<SupplierId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl MovementFilter {
    fn matches_window(&self, occurred_at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|f| occurred_at >= f) && self.to.is_none_or(|t| occurred_at <= t)
    }
}

/// One page of a listing, newest first.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total: usize,
}

#[derive(Debug, Error)]
pub enum MovementLogError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Movement log projection: the queryable history of all recorded movements.
///
/// Backs the import/export/transfer/check listings and supplies the ordered
/// event sequence the historical reconstructor replays.
#[derive(Debug)]
pub struct MovementLogProjection<S>
where
    S: ReadModelStore<Uuid, MovementRecord>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> MovementLogProjection<S>
where
    S: ReadModelStore<Uuid, MovementRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a published envelope into the log.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), MovementLogError> {
        if envelope.aggregate_type() != "inventory.ledger" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(MovementLogError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(MovementLogError::NonMonotonicSequence { last, found: seq });
            }

            let event: LedgerEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| MovementLogError::Deserialize(e.to_string()))?;

            self.store.upsert(
                event.movement_id(),
                MovementRecord {
                    movement_id: event.movement_id(),
                    sequence_number: seq,
                    occurred_at: event.occurred_at(),
                    event,
                },
            );

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Imports, newest first.
    pub fn imports(&self, filter: MovementFilter, page: usize, limit: usize) -> Page<MovementRecord> {
        self.page(page, limit, |r| match &r.event {
            LedgerEvent::ImportRecorded(e) => {
                filter.warehouse_id.is_none_or(|w| e.warehouse_id == w)
                    && filter.supplier_id.is_none_or(|s| e.supplier_id == s)
                    && filter.matches_window(r.occurred_at)
            }
            _ => false,
        })
    }

    /// Exports, newest first.
    pub fn exports(&self, filter: MovementFilter, page: usize, limit: usize) -> Page<MovementRecord> {
        self.page(page, limit, |r| match &r.event {
            LedgerEvent::ExportRecorded(e) => {
                filter.warehouse_id.is_none_or(|w| e.warehouse_id == w)
                    && filter.matches_window(r.occurred_at)
            }
            _ => false,
        })
    }

    /// Transfers, newest first. The warehouse filter matches either endpoint.
    pub fn transfers(&self, filter: MovementFilter, page: usize, limit: usize) -> Page<MovementRecord> {
        self.page(page, limit, |r| match &r.event {
            LedgerEvent::TransferRecorded(e) => {
                filter
                    .warehouse_id
                    .is_none_or(|w| e.from_warehouse_id == w || e.to_warehouse_id == Some(w))
                    && filter.matches_window(r.occurred_at)
            }
            _ => false,
        })
    }

    /// Inventory checks, newest first.
    pub fn checks(&self, filter: MovementFilter, page: usize, limit: usize) -> Page<MovementRecord> {
        self.page(page, limit, |r| match &r.event {
            LedgerEvent::CheckRecorded(e) => {
                filter.warehouse_id.is_none_or(|w| e.warehouse_id == w)
                    && filter.matches_window(r.occurred_at)
            }
            _ => false,
        })
    }

    /// The full event sequence up to and including `as_of`, in stream order.
    pub fn events_until(&self, as_of: DateTime<Utc>) -> Vec<LedgerEvent> {
        let mut records: Vec<MovementRecord> = self
            .store
            .list()
            .into_iter()
            .filter(|r| r.occurred_at <= as_of)
            .collect();

        records.sort_by_key(|r| r.sequence_number);
        records.into_iter().map(|r| r.event).collect()
    }

    fn page(
        &self,
        page: usize,
        limit: usize,
        keep: impl Fn(&MovementRecord) -> bool,
    ) -> Page<MovementRecord> {
        let mut records: Vec<MovementRecord> =
            self.store.list().into_iter().filter(|r| keep(r)).collect();

        // Newest first, sequence number as a stable tie-breaker.
        records.sort_by_key(|r| (std::cmp::Reverse(r.occurred_at), std::cmp::Reverse(r.sequence_number)));

        let total = records.len();
        let page = page.max(1);
        let items = records
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Page { items, page, total }
    }

    /// Rebuild the log from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), MovementLogError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryReadModelStore;
    use chrono::TimeZone;
    use depot_core::ProductId;
    use depot_inventory::{ExportLine, ExportRecorded, ImportLine, ImportRecorded};
    use std::sync::Arc;

    fn projection() -> MovementLogProjection<Arc<InMemoryReadModelStore<Uuid, MovementRecord>>> {
        MovementLogProjection::new(Arc::new(InMemoryReadModelStore::new()))
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    fn import_envelope(
        ledger: AggregateId,
        seq: u64,
        warehouse: WarehouseId,
        supplier: SupplierId,
        occurred_at: DateTime<Utc>,
    ) -> EventEnvelope<JsonValue> {
        let event = LedgerEvent::ImportRecorded(ImportRecorded {
            import_id: Uuid::now_v7(),
            warehouse_id: warehouse,
            supplier_id: supplier,
            lines: vec![ImportLine {
                product_id: ProductId::new(),
                quantity: 1,
                unit_price: 1,
            }],
            total_amount: 1,
            occurred_at,
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            ledger,
            "inventory.ledger".to_string(),
            seq,
            occurred_at,
            serde_json::to_value(&event).unwrap(),
        )
    }

    #[test]
    fn filters_by_supplier_and_date_window() {
        let proj = projection();
        let ledger = AggregateId::new();
        let warehouse = WarehouseId::new();
        let supplier_a = SupplierId::new();
        let supplier_b = SupplierId::new();

        proj.apply_envelope(&import_envelope(ledger, 1, warehouse, supplier_a, at(1))).unwrap();
        proj.apply_envelope(&import_envelope(ledger, 2, warehouse, supplier_b, at(5))).unwrap();
        proj.apply_envelope(&import_envelope(ledger, 3, warehouse, supplier_a, at(9))).unwrap();

        let by_supplier = proj.imports(
            MovementFilter {
                supplier_id: Some(supplier_a),
                ..MovementFilter::default()
            },
            1,
            10,
        );
        assert_eq!(by_supplier.total, 2);

        let windowed = proj.imports(
            MovementFilter {
                from: Some(at(4)),
                to: Some(at(6)),
                ..MovementFilter::default()
            },
            1,
            10,
        );
        assert_eq!(windowed.total, 1);
    }

    #[test]
    fn pagination_is_newest_first() {
        let proj = projection();
        let ledger = AggregateId::new();
        let warehouse = WarehouseId::new();
        let supplier = SupplierId::new();

        for seq in 1..=5 {
            proj.apply_envelope(&import_envelope(ledger, seq, warehouse, supplier, at(seq as u32)))
                .unwrap();
        }

        let first = proj.imports(MovementFilter::default(), 1, 2);
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].occurred_at, at(5));

        let last = proj.imports(MovementFilter::default(), 3, 2);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].occurred_at, at(1));
    }

    #[test]
    fn events_until_is_in_stream_order_and_bounded() {
        let proj = projection();
        let ledger = AggregateId::new();
        let warehouse = WarehouseId::new();
        let supplier = SupplierId::new();

        proj.apply_envelope(&import_envelope(ledger, 1, warehouse, supplier, at(1))).unwrap();

        let export = LedgerEvent::ExportRecorded(ExportRecorded {
            export_id: Uuid::now_v7(),
            warehouse_id: warehouse,
            lines: vec![ExportLine {
                product_id: ProductId::new(),
                quantity: 1,
            }],
            occurred_at: at(3),
        });
        proj.apply_envelope(&EventEnvelope::new(
            Uuid::now_v7(),
            ledger,
            "inventory.ledger".to_string(),
            2,
            at(3),
            serde_json::to_value(&export).unwrap(),
        ))
        .unwrap();

        let events = proj.events_until(at(2));
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], LedgerEvent::ImportRecorded(_)));

        let events = proj.events_until(at(4));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], LedgerEvent::ExportRecorded(_)));
    }
}
