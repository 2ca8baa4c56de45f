//! Point-in-time balance reconstruction.
//!
//! The ledger keeps no balance history, only movements. A historical level is
//! recovered by anchoring on the latest physical check at or before the target
//! instant (the check's declared count is a snapshot) and replaying the
//! movements between the anchor and the target in their natural direction.
//! Pairs that were never checked replay forward from empty. Checks bound the
//! replay window and absorb any drift or manual correction that happened
//! before them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use depot_core::{ProductId, WarehouseId};
use depot_events::Event;

use crate::ledger::LedgerEvent;
use crate::movement::StockKey;

/// One reconstructed stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructedLevel {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// Reconstruct per-(product, warehouse) levels as of `as_of`.
///
/// `events` must be in stream order (the order they were appended); events
/// after `as_of` are ignored. Only strictly positive levels are returned:
/// callers cannot distinguish "never stocked here" from "reached zero",
/// matching the live inventory listing.
pub fn reconstruct_levels(
    events: &[LedgerEvent],
    as_of: DateTime<Utc>,
    warehouse: Option<WarehouseId>,
) -> Vec<ReconstructedLevel> {
    // `base` holds the latest check snapshot per pair, `delta` the net
    // movement effect since that snapshot. A single forward pass maintains
    // both: a check resets the pair's base and clears its accumulated delta.
    let mut base: HashMap<StockKey, i64> = HashMap::new();
    let mut delta: HashMap<StockKey, i64> = HashMap::new();

    for event in events {
        if event.occurred_at() > as_of {
            continue;
        }

        match event {
            LedgerEvent::ImportRecorded(e) => {
                for line in &e.lines {
                    *delta
                        .entry(StockKey::new(line.product_id, e.warehouse_id))
                        .or_insert(0) += line.quantity;
                }
            }
            LedgerEvent::ExportRecorded(e) => {
                for line in &e.lines {
                    *delta
                        .entry(StockKey::new(line.product_id, e.warehouse_id))
                        .or_insert(0) -= line.quantity;
                }
            }
            LedgerEvent::TransferRecorded(e) => {
                for line in &e.lines {
                    *delta
                        .entry(StockKey::new(line.product_id, e.from_warehouse_id))
                        .or_insert(0) -= line.quantity;

                    if let Some(to) = e.to_warehouse_id {
                        *delta
                            .entry(StockKey::new(line.product_id, to))
                            .or_insert(0) += line.quantity;
                    }
                }
            }
            LedgerEvent::CheckRecorded(e) => {
                for count in &e.counts {
                    let key = StockKey::new(count.product_id, e.warehouse_id);
                    base.insert(key, count.actual_quantity);
                    delta.remove(&key);
                }
            }
        }
    }

    let mut keys: Vec<StockKey> = base.keys().chain(delta.keys()).copied().collect();
    keys.sort();
    keys.dedup();

    let mut levels = Vec::new();
    for key in keys {
        if let Some(filter) = warehouse {
            if key.warehouse_id != filter {
                continue;
            }
        }

        let quantity = base.get(&key).copied().unwrap_or(0) + delta.get(&key).copied().unwrap_or(0);
        if quantity > 0 {
            levels.push(ReconstructedLevel {
                product_id: key.product_id,
                warehouse_id: key.warehouse_id,
                quantity,
            });
        }
    }

    levels
}
