use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use depot_core::{AggregateId, ProductId, WarehouseId};
use depot_events::EventEnvelope;
use depot_inventory::{LedgerEvent, StockKey};

use crate::read_model::ReadModelStore;

/// Queryable stock read model: current on-hand quantity per (product, warehouse).
///
/// Levels that reach zero stay in the store with quantity 0; `get` treats an
/// absent key as 0, so both representations answer lookups identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

#[derive(Debug, Error)]
pub enum StockProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the live
/// quantity per (product, warehouse). Read models are disposable and
/// rebuildable from the event stream.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadModelStore<StockKey, StockLevel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<StockKey, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Current quantity for a product at a warehouse (0 if never stocked).
    pub fn get(&self, product_id: ProductId, warehouse_id: WarehouseId) -> i64 {
        self.store
            .get(&StockKey::new(product_id, warehouse_id))
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    /// All levels, optionally restricted to one warehouse, in a stable order.
    pub fn list(&self, warehouse_id: Option<WarehouseId>) -> Vec<StockLevel> {
        let mut levels: Vec<StockLevel> = self
            .store
            .list()
            .into_iter()
            .filter(|l| warehouse_id.is_none_or(|w| l.warehouse_id == w))
            .collect();

        levels.sort_by_key(|l| (l.warehouse_id, l.product_id));
        levels
    }

    /// Global quantity of a product across every warehouse (derived figure).
    pub fn total_for_product(&self, product_id: ProductId) -> i64 {
        self.store
            .list()
            .into_iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockProjectionError> {
        if envelope.aggregate_type() != "inventory.ledger" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: LedgerEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| StockProjectionError::Deserialize(e.to_string()))?;

            self.apply_event(&event);

            // Advance cursor after successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    fn apply_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::ImportRecorded(e) => {
                for line in &e.lines {
                    self.adjust(line.product_id, e.warehouse_id, line.quantity);
                }
            }
            LedgerEvent::ExportRecorded(e) => {
                for line in &e.lines {
                    self.adjust(line.product_id, e.warehouse_id, -line.quantity);
                }
            }
            LedgerEvent::TransferRecorded(e) => {
                for line in &e.lines {
                    self.adjust(line.product_id, e.from_warehouse_id, -line.quantity);
                    if let Some(to) = e.to_warehouse_id {
                        self.adjust(line.product_id, to, line.quantity);
                    }
                }
            }
            LedgerEvent::CheckRecorded(e) => {
                for count in &e.counts {
                    self.store.upsert(
                        StockKey::new(count.product_id, e.warehouse_id),
                        StockLevel {
                            product_id: count.product_id,
                            warehouse_id: e.warehouse_id,
                            quantity: count.actual_quantity,
                        },
                    );
                }
            }
        }
    }

    fn adjust(&self, product_id: ProductId, warehouse_id: WarehouseId, delta: i64) {
        let key = StockKey::new(product_id, warehouse_id);
        let mut level = self.store.get(&key).unwrap_or(StockLevel {
            product_id,
            warehouse_id,
            quantity: 0,
        });
        level.quantity += delta;
        self.store.upsert(key, level);
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Deterministic replay order: aggregate, sequence.
        envs.sort_by_key(|e| (e.aggregate_id(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
