//! Inventory ledger domain module (event-sourced).
//!
//! This crate contains the business rules for stock movements, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//! the `StockLedger` aggregate records imports, exports, transfers and
//! physical checks, and `reconstruct` answers point-in-time balance queries
//! over the resulting event sequence.

pub mod ledger;
pub mod movement;
pub mod reconstruct;

pub use ledger::{
    CheckRecorded, ExportRecorded, ImportRecorded, LedgerCommand, LedgerEvent, LedgerId,
    RecordCheck, RecordExport, RecordImport, RecordTransfer, StockLedger, TransferRecorded,
};
pub use movement::{
    CheckCount, CheckLine, ExportLine, ImportLine, StockKey, TransferKind, TransferLine,
};
pub use reconstruct::{ReconstructedLevel, reconstruct_levels};
