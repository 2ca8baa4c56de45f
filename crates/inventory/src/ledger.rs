use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use depot_core::{Aggregate, AggregateId, AggregateRoot, DomainError, SupplierId, WarehouseId};
use depot_events::Event;

use crate::movement::{
    CheckCount, CheckLine, ExportLine, ImportLine, StockKey, TransferKind, TransferLine,
};

/// Stock ledger identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The singleton ledger stream.
    ///
    /// All movements share one stream: internal transfers touch two
    /// warehouses at once, so per-warehouse streams could not commit them
    /// atomically. The fixed id keeps the stream addressable across restarts.
    pub fn global() -> Self {
        Self(AggregateId::from_uuid(Uuid::nil()))
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: StockLedger.
///
/// State is the current on-hand quantity per (product, warehouse). Levels
/// that reach zero are retained at 0; an absent key reads as 0, so the two
/// representations are equivalent for every lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: LedgerId,
    levels: HashMap<StockKey, i64>,
    version: u64,
}

impl StockLedger {
    /// Create an empty aggregate instance for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            levels: HashMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    /// Current on-hand quantity for a product at a warehouse (0 if never stocked).
    pub fn level(&self, key: &StockKey) -> i64 {
        self.levels.get(key).copied().unwrap_or(0)
    }

    pub fn levels(&self) -> &HashMap<StockKey, i64> {
        &self.levels
    }
}

impl AggregateRoot for StockLedger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordImport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImport {
    pub ledger_id: LedgerId,
    pub import_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub supplier_id: SupplierId,
    pub lines: Vec<ImportLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordExport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExport {
    pub ledger_id: LedgerId,
    pub export_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<ExportLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransfer {
    pub ledger_id: LedgerId,
    pub transfer_id: Uuid,
    pub kind: TransferKind,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: Option<WarehouseId>,
    pub lines: Vec<TransferLine>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCheck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCheck {
    pub ledger_id: LedgerId,
    pub check_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<CheckLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordImport(RecordImport),
    RecordExport(RecordExport),
    RecordTransfer(RecordTransfer),
    RecordCheck(RecordCheck),
}

/// Event: ImportRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecorded {
    pub import_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub supplier_id: SupplierId,
    pub lines: Vec<ImportLine>,
    /// Σ quantity × unit_price over the lines.
    pub total_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExportRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecorded {
    pub export_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<ExportLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecorded {
    pub transfer_id: Uuid,
    pub kind: TransferKind,
    pub from_warehouse_id: WarehouseId,
    /// Absent for repair/discard sinks.
    pub to_warehouse_id: Option<WarehouseId>,
    pub lines: Vec<TransferLine>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CheckRecorded.
///
/// Carries the settled counts (expected/actual/difference) so that replaying
/// the event needs no other source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecorded {
    pub check_id: Uuid,
    pub warehouse_id: WarehouseId,
    pub counts: Vec<CheckCount>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ImportRecorded(ImportRecorded),
    ExportRecorded(ExportRecorded),
    TransferRecorded(TransferRecorded),
    CheckRecorded(CheckRecorded),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::ImportRecorded(_) => "inventory.ledger.import_recorded",
            LedgerEvent::ExportRecorded(_) => "inventory.ledger.export_recorded",
            LedgerEvent::TransferRecorded(_) => "inventory.ledger.transfer_recorded",
            LedgerEvent::CheckRecorded(_) => "inventory.ledger.check_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::ImportRecorded(e) => e.occurred_at,
            LedgerEvent::ExportRecorded(e) => e.occurred_at,
            LedgerEvent::TransferRecorded(e) => e.occurred_at,
            LedgerEvent::CheckRecorded(e) => e.occurred_at,
        }
    }
}

impl LedgerEvent {
    /// The identifier of the recorded movement (import/export/transfer/check id).
    pub fn movement_id(&self) -> Uuid {
        match self {
            LedgerEvent::ImportRecorded(e) => e.import_id,
            LedgerEvent::ExportRecorded(e) => e.export_id,
            LedgerEvent::TransferRecorded(e) => e.transfer_id,
            LedgerEvent::CheckRecorded(e) => e.check_id,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::ImportRecorded(e) => {
                for line in &e.lines {
                    *self
                        .levels
                        .entry(StockKey::new(line.product_id, e.warehouse_id))
                        .or_insert(0) += line.quantity;
                }
            }
            LedgerEvent::ExportRecorded(e) => {
                for line in &e.lines {
                    *self
                        .levels
                        .entry(StockKey::new(line.product_id, e.warehouse_id))
                        .or_insert(0) -= line.quantity;
                }
            }
            LedgerEvent::TransferRecorded(e) => {
                for line in &e.lines {
                    *self
                        .levels
                        .entry(StockKey::new(line.product_id, e.from_warehouse_id))
                        .or_insert(0) -= line.quantity;

                    if let Some(to) = e.to_warehouse_id {
                        *self
                            .levels
                            .entry(StockKey::new(line.product_id, to))
                            .or_insert(0) += line.quantity;
                    }
                }
            }
            LedgerEvent::CheckRecorded(e) => {
                for count in &e.counts {
                    self.levels.insert(
                        StockKey::new(count.product_id, e.warehouse_id),
                        count.actual_quantity,
                    );
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordImport(cmd) => self.handle_import(cmd),
            LedgerCommand::RecordExport(cmd) => self.handle_export(cmd),
            LedgerCommand::RecordTransfer(cmd) => self.handle_transfer(cmd),
            LedgerCommand::RecordCheck(cmd) => self.handle_check(cmd),
        }
    }
}

impl StockLedger {
    fn handle_import(&self, cmd: &RecordImport) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("import must have at least one line"));
        }

        let mut total_amount: i64 = 0;
        for line in &cmd.lines {
            if line.quantity < 1 {
                return Err(DomainError::validation("quantity must be a positive integer"));
            }
            if line.unit_price < 0 {
                return Err(DomainError::validation("unit price cannot be negative"));
            }
            total_amount += line.quantity * line.unit_price;
        }

        Ok(vec![LedgerEvent::ImportRecorded(ImportRecorded {
            import_id: cmd.import_id,
            warehouse_id: cmd.warehouse_id,
            supplier_id: cmd.supplier_id,
            lines: cmd.lines.clone(),
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_export(&self, cmd: &RecordExport) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("export must have at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity < 1 {
                return Err(DomainError::validation("quantity must be a positive integer"));
            }
        }

        self.ensure_available(
            cmd.warehouse_id,
            cmd.lines.iter().map(|l| (l.product_id, l.quantity)),
        )?;

        Ok(vec![LedgerEvent::ExportRecorded(ExportRecorded {
            export_id: cmd.export_id,
            warehouse_id: cmd.warehouse_id,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transfer(&self, cmd: &RecordTransfer) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("transfer must have at least one line"));
        }
        for line in &cmd.lines {
            if line.quantity < 1 {
                return Err(DomainError::validation("quantity must be a positive integer"));
            }
        }

        match cmd.kind {
            TransferKind::Internal => match cmd.to_warehouse_id {
                None => {
                    return Err(DomainError::validation(
                        "internal transfer requires a destination warehouse",
                    ));
                }
                Some(to) if to == cmd.from_warehouse_id => {
                    return Err(DomainError::validation(
                        "destination warehouse must differ from source",
                    ));
                }
                Some(_) => {}
            },
            TransferKind::Repair | TransferKind::Discard => {
                if cmd.to_warehouse_id.is_some() {
                    return Err(DomainError::validation(
                        "repair/discard transfers cannot name a destination warehouse",
                    ));
                }
            }
        }

        self.ensure_available(
            cmd.from_warehouse_id,
            cmd.lines.iter().map(|l| (l.product_id, l.quantity)),
        )?;

        Ok(vec![LedgerEvent::TransferRecorded(TransferRecorded {
            transfer_id: cmd.transfer_id,
            kind: cmd.kind,
            from_warehouse_id: cmd.from_warehouse_id,
            to_warehouse_id: cmd.to_warehouse_id,
            lines: cmd.lines.clone(),
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_check(&self, cmd: &RecordCheck) -> Result<Vec<LedgerEvent>, DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("check must have at least one line"));
        }

        let mut counts = Vec::with_capacity(cmd.lines.len());
        for line in &cmd.lines {
            if line.actual_quantity < 0 {
                return Err(DomainError::validation("actual quantity cannot be negative"));
            }
            let expected = self.level(&StockKey::new(line.product_id, cmd.warehouse_id));
            counts.push(CheckCount {
                product_id: line.product_id,
                expected_quantity: expected,
                actual_quantity: line.actual_quantity,
                difference: line.actual_quantity - expected,
            });
        }

        Ok(vec![LedgerEvent::CheckRecorded(CheckRecorded {
            check_id: cmd.check_id,
            warehouse_id: cmd.warehouse_id,
            counts,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Check that the warehouse can satisfy the **cumulative** requested
    /// quantity per product. Fails on the first line whose running total
    /// exceeds the on-hand level, so a product listed twice cannot sneak past
    /// the guard. Failing here emits nothing: the command is all-or-nothing.
    fn ensure_available(
        &self,
        warehouse_id: WarehouseId,
        requests: impl Iterator<Item = (depot_core::ProductId, i64)>,
    ) -> Result<(), DomainError> {
        let mut requested: HashMap<depot_core::ProductId, i64> = HashMap::new();

        for (product_id, quantity) in requests {
            let total = requested.entry(product_id).or_insert(0);
            *total += quantity;

            let available = self.level(&StockKey::new(product_id, warehouse_id));
            if *total > available {
                return Err(DomainError::InsufficientStock {
                    product_id,
                    requested: *total,
                    available,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::ProductId;
    use proptest::prelude::*;

    fn ledger_with<I>(events: I) -> StockLedger
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        let mut ledger = StockLedger::empty(LedgerId::global());
        for ev in events {
            ledger.apply(&ev);
        }
        ledger
    }

    fn run(ledger: &mut StockLedger, cmd: LedgerCommand) -> Result<Vec<LedgerEvent>, DomainError> {
        let events = ledger.handle(&cmd)?;
        for ev in &events {
            ledger.apply(ev);
        }
        Ok(events)
    }

    fn import(warehouse_id: WarehouseId, product_id: ProductId, quantity: i64, unit_price: i64) -> LedgerCommand {
        LedgerCommand::RecordImport(RecordImport {
            ledger_id: LedgerId::global(),
            import_id: Uuid::now_v7(),
            warehouse_id,
            supplier_id: SupplierId::new(),
            lines: vec![ImportLine {
                product_id,
                quantity,
                unit_price,
            }],
            occurred_at: Utc::now(),
        })
    }

    fn export(warehouse_id: WarehouseId, product_id: ProductId, quantity: i64) -> LedgerCommand {
        LedgerCommand::RecordExport(RecordExport {
            ledger_id: LedgerId::global(),
            export_id: Uuid::now_v7(),
            warehouse_id,
            lines: vec![ExportLine {
                product_id,
                quantity,
            }],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn import_computes_total_amount_and_raises_level() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        let events = run(&mut ledger, import(warehouse, product, 5, 100)).unwrap();
        match &events[0] {
            LedgerEvent::ImportRecorded(e) => assert_eq!(e.total_amount, 500),
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(ledger.level(&StockKey::new(product, warehouse)), 5);
    }

    #[test]
    fn export_beyond_available_is_rejected_and_changes_nothing() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        run(&mut ledger, import(warehouse, product, 2, 10)).unwrap();
        let before = ledger.clone();

        let err = ledger.handle(&export(warehouse, product, 3)).unwrap_err();
        match err {
            DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            } => {
                assert_eq!(product_id, product);
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(ledger, before);
    }

    #[test]
    fn duplicate_product_lines_are_checked_cumulatively() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        run(&mut ledger, import(warehouse, product, 5, 1)).unwrap();

        // 3 + 3 = 6 > 5 even though each line alone would pass.
        let cmd = LedgerCommand::RecordExport(RecordExport {
            ledger_id: LedgerId::global(),
            export_id: Uuid::now_v7(),
            warehouse_id: warehouse,
            lines: vec![
                ExportLine { product_id: product, quantity: 3 },
                ExportLine { product_id: product, quantity: 3 },
            ],
            occurred_at: Utc::now(),
        });

        let err = ledger.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { requested: 6, .. }));
    }

    #[test]
    fn internal_transfer_moves_the_full_quantity() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let from = WarehouseId::new();
        let to = WarehouseId::new();
        let product = ProductId::new();

        run(&mut ledger, import(from, product, 10, 7)).unwrap();

        let cmd = LedgerCommand::RecordTransfer(RecordTransfer {
            ledger_id: LedgerId::global(),
            transfer_id: Uuid::now_v7(),
            kind: TransferKind::Internal,
            from_warehouse_id: from,
            to_warehouse_id: Some(to),
            lines: vec![TransferLine { product_id: product, quantity: 10 }],
            reason: None,
            occurred_at: Utc::now(),
        });
        run(&mut ledger, cmd).unwrap();

        // Source retained at zero, destination holds the moved units.
        assert_eq!(ledger.level(&StockKey::new(product, from)), 0);
        assert!(ledger.levels().contains_key(&StockKey::new(product, from)));
        assert_eq!(ledger.level(&StockKey::new(product, to)), 10);
    }

    #[test]
    fn internal_transfer_to_same_warehouse_is_rejected() {
        let ledger = ledger_with([]);
        let warehouse = WarehouseId::new();

        let cmd = LedgerCommand::RecordTransfer(RecordTransfer {
            ledger_id: LedgerId::global(),
            transfer_id: Uuid::now_v7(),
            kind: TransferKind::Internal,
            from_warehouse_id: warehouse,
            to_warehouse_id: Some(warehouse),
            lines: vec![TransferLine { product_id: ProductId::new(), quantity: 1 }],
            reason: None,
            occurred_at: Utc::now(),
        });

        assert!(matches!(ledger.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn discard_transfer_only_decrements_the_source() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let from = WarehouseId::new();
        let product = ProductId::new();

        run(&mut ledger, import(from, product, 4, 1)).unwrap();

        let cmd = LedgerCommand::RecordTransfer(RecordTransfer {
            ledger_id: LedgerId::global(),
            transfer_id: Uuid::now_v7(),
            kind: TransferKind::Discard,
            from_warehouse_id: from,
            to_warehouse_id: None,
            lines: vec![TransferLine { product_id: product, quantity: 3 }],
            reason: Some("water damage".to_string()),
            occurred_at: Utc::now(),
        });
        run(&mut ledger, cmd).unwrap();

        assert_eq!(ledger.level(&StockKey::new(product, from)), 1);
        assert_eq!(ledger.levels().len(), 1);
    }

    #[test]
    fn check_reports_differences_and_snaps_the_level() {
        let mut ledger = StockLedger::empty(LedgerId::global());
        let warehouse = WarehouseId::new();
        let product = ProductId::new();

        run(&mut ledger, import(warehouse, product, 5, 100)).unwrap();
        run(&mut ledger, export(warehouse, product, 3)).unwrap();

        // Counting exactly what the ledger expects: difference 0.
        let cmd = LedgerCommand::RecordCheck(RecordCheck {
            ledger_id: LedgerId::global(),
            check_id: Uuid::now_v7(),
            warehouse_id: warehouse,
            lines: vec![CheckLine { product_id: product, actual_quantity: 2 }],
            occurred_at: Utc::now(),
        });
        let events = run(&mut ledger, cmd).unwrap();
        match &events[0] {
            LedgerEvent::CheckRecorded(e) => {
                assert_eq!(e.counts[0].difference, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // A surplus count corrects the level upward.
        let cmd = LedgerCommand::RecordCheck(RecordCheck {
            ledger_id: LedgerId::global(),
            check_id: Uuid::now_v7(),
            warehouse_id: warehouse,
            lines: vec![CheckLine { product_id: product, actual_quantity: 10 }],
            occurred_at: Utc::now(),
        });
        let events = run(&mut ledger, cmd).unwrap();
        match &events[0] {
            LedgerEvent::CheckRecorded(e) => {
                assert_eq!(e.counts[0].expected_quantity, 2);
                assert_eq!(e.counts[0].difference, 8);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(ledger.level(&StockKey::new(product, warehouse)), 10);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of import/export attempts on one
        /// (product, warehouse), the level equals the signed sum of the
        /// accepted movements, and never goes negative.
        #[test]
        fn level_is_signed_sum_of_accepted_movements(
            ops in prop::collection::vec((any::<bool>(), 1i64..50i64), 1..40)
        ) {
            let warehouse = WarehouseId::new();
            let product = ProductId::new();
            let mut ledger = StockLedger::empty(LedgerId::global());
            let mut expected: i64 = 0;

            for (is_import, quantity) in ops {
                if is_import {
                    run(&mut ledger, import(warehouse, product, quantity, 1)).unwrap();
                    expected += quantity;
                } else {
                    match run(&mut ledger, export(warehouse, product, quantity)) {
                        Ok(_) => expected -= quantity,
                        Err(DomainError::InsufficientStock { .. }) => {
                            // Rejected: must not have applied anything.
                            prop_assert!(quantity > expected);
                        }
                        Err(other) => panic!("unexpected error: {other:?}"),
                    }
                }

                let level = ledger.level(&StockKey::new(product, warehouse));
                prop_assert_eq!(level, expected);
                prop_assert!(level >= 0);
            }
        }
    }
}
