//! Shared movement vocabulary: line items, transfer kinds, stock keys.

use serde::{Deserialize, Serialize};

use depot_core::{ProductId, WarehouseId};

/// Key of one stock level: a product at a warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

/// Destination semantics of a transfer.
///
/// `Repair` and `Discard` move stock to a sink outside the warehouse graph:
/// they have no destination warehouse and only decrement the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Internal,
    Repair,
    Discard,
}

/// One line of an import: quantity received at a unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Purchase price per unit, in the smallest currency unit.
    pub unit_price: i64,
}

/// One line of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One line of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One declared count of a physical inventory check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckLine {
    pub product_id: ProductId,
    pub actual_quantity: i64,
}

/// A settled count: what the ledger expected vs. what was found.
///
/// `difference = actual_quantity - expected_quantity`; a non-zero value is a
/// discrepancy the check corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCount {
    pub product_id: ProductId,
    pub expected_quantity: i64,
    pub actual_quantity: i64,
    pub difference: i64,
}
