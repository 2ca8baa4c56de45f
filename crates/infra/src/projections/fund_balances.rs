use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use depot_core::{AggregateId, FundAccountId};
use depot_events::EventEnvelope;
use depot_funds::{FundAccountKind, FundEvent, VoucherKind};

use crate::read_model::ReadModelStore;

/// Fund account read model with its live balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundAccountReadModel {
    pub account_id: FundAccountId,
    pub name: String,
    pub kind: FundAccountKind,
    pub initial_balance: i64,
    pub balance: i64,
    pub opened_at: DateTime<Utc>,
}

/// One recorded voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherReadModel {
    pub voucher_id: Uuid,
    pub account_id: FundAccountId,
    pub kind: VoucherKind,
    pub amount: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Filter for voucher listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoucherFilter {
    pub account_id: Option<FundAccountId>,
    pub kind: Option<VoucherKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum FundProjectionError {
    #[error("failed to deserialize fund event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Fund balances projection: live balance per account plus the voucher log.
#[derive(Debug)]
pub struct FundBalancesProjection<A, V>
where
    A: ReadModelStore<FundAccountId, FundAccountReadModel>,
    V: ReadModelStore<Uuid, VoucherReadModel>,
{
    accounts: A,
    vouchers: V,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<A, V> FundBalancesProjection<A, V>
where
    A: ReadModelStore<FundAccountId, FundAccountReadModel>,
    V: ReadModelStore<Uuid, VoucherReadModel>,
{
    pub fn new(accounts: A, vouchers: V) -> Self {
        Self {
            accounts,
            vouchers,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn account(&self, account_id: FundAccountId) -> Option<FundAccountReadModel> {
        self.accounts.get(&account_id)
    }

    /// All accounts, newest first.
    pub fn accounts(&self) -> Vec<FundAccountReadModel> {
        let mut items = self.accounts.list();
        items.sort_by_key(|a| std::cmp::Reverse(a.opened_at));
        items
    }

    /// Vouchers matching the filter, newest first.
    pub fn vouchers(&self, filter: VoucherFilter) -> Vec<VoucherReadModel> {
        let mut items: Vec<VoucherReadModel> = self
            .vouchers
            .list()
            .into_iter()
            .filter(|v| {
                filter.account_id.is_none_or(|a| v.account_id == a)
                    && filter.kind.is_none_or(|k| v.kind == k)
                    && filter.from.is_none_or(|f| v.occurred_at >= f)
                    && filter.to.is_none_or(|t| v.occurred_at <= t)
            })
            .collect();

        items.sort_by_key(|v| std::cmp::Reverse(v.occurred_at));
        items
    }

    /// Balance of an account as of `as_of`: the opening balance plus the
    /// signed sum of vouchers dated at or before that instant.
    pub fn balance_at(&self, account_id: FundAccountId, as_of: DateTime<Utc>) -> Option<i64> {
        let account = self.accounts.get(&account_id)?;

        let mut balance = account.initial_balance;
        for voucher in self.vouchers.list() {
            if voucher.account_id != account_id || voucher.occurred_at > as_of {
                continue;
            }
            match voucher.kind {
                VoucherKind::Receipt => balance += voucher.amount,
                VoucherKind::Payment => balance -= voucher.amount,
            }
        }

        Some(balance)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), FundProjectionError> {
        if envelope.aggregate_type() != "funds.account" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(FundProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(FundProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: FundEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| FundProjectionError::Deserialize(e.to_string()))?;

            match event {
                FundEvent::AccountOpened(e) => {
                    self.accounts.upsert(
                        e.account_id,
                        FundAccountReadModel {
                            account_id: e.account_id,
                            name: e.name,
                            kind: e.kind,
                            initial_balance: e.initial_balance,
                            balance: e.initial_balance,
                            opened_at: e.occurred_at,
                        },
                    );
                }
                FundEvent::VoucherRecorded(e) => {
                    if let Some(mut account) = self.accounts.get(&e.account_id) {
                        match e.kind {
                            VoucherKind::Receipt => account.balance += e.amount,
                            VoucherKind::Payment => account.balance -= e.amount,
                        }
                        self.accounts.upsert(e.account_id, account);
                    }

                    self.vouchers.upsert(
                        e.voucher_id,
                        VoucherReadModel {
                            voucher_id: e.voucher_id,
                            account_id: e.account_id,
                            kind: e.kind,
                            amount: e.amount,
                            description: e.description,
                            occurred_at: e.occurred_at,
                        },
                    );
                }
            }

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), FundProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.accounts.clear();
        self.vouchers.clear();

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
    use depot_events::Event;
    use depot_funds::{AccountOpened, VoucherRecorded};
    use std::sync::Arc;

    type Projection = FundBalancesProjection<
        Arc<InMemoryReadModelStore<FundAccountId, FundAccountReadModel>>,
        Arc<InMemoryReadModelStore<Uuid, VoucherReadModel>>,
    >;

    fn projection() -> Projection {
        FundBalancesProjection::new(
            Arc::new(InMemoryReadModelStore::new()),
            Arc::new(InMemoryReadModelStore::new()),
        )
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, 10, 0, 0).unwrap()
    }

    fn envelope(aggregate_id: AggregateId, seq: u64, event: FundEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "funds.account".to_string(),
            seq,
            event.occurred_at(),
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn open_and_move_money(proj: &Projection) -> FundAccountId {
        let account_id = FundAccountId::new();
        let stream = AggregateId::from_uuid(account_id.into());

        proj.apply_envelope(&envelope(
            stream,
            1,
            FundEvent::AccountOpened(AccountOpened {
                account_id,
                name: "till".to_string(),
                kind: FundAccountKind::Cash,
                initial_balance: 100,
                occurred_at: at(1),
            }),
        ))
        .unwrap();

        proj.apply_envelope(&envelope(
            stream,
            2,
            FundEvent::VoucherRecorded(VoucherRecorded {
                account_id,
                voucher_id: Uuid::now_v7(),
                kind: VoucherKind::Receipt,
                amount: 40,
                description: None,
                occurred_at: at(3),
            }),
        ))
        .unwrap();

        proj.apply_envelope(&envelope(
            stream,
            3,
            FundEvent::VoucherRecorded(VoucherRecorded {
                account_id,
                voucher_id: Uuid::now_v7(),
                kind: VoucherKind::Payment,
                amount: 25,
                description: Some("supplies".to_string()),
                occurred_at: at(5),
            }),
        ))
        .unwrap();

        account_id
    }

    #[test]
    fn live_balance_tracks_vouchers() {
        let proj = projection();
        let account_id = open_and_move_money(&proj);

        assert_eq!(proj.account(account_id).unwrap().balance, 115);
        assert_eq!(proj.vouchers(VoucherFilter::default()).len(), 2);
    }

    #[test]
    fn balance_at_walks_vouchers_up_to_the_date() {
        let proj = projection();
        let account_id = open_and_move_money(&proj);

        assert_eq!(proj.balance_at(account_id, at(1)), Some(100));
        assert_eq!(proj.balance_at(account_id, at(4)), Some(140));
        assert_eq!(proj.balance_at(account_id, at(6)), Some(115));
        assert_eq!(proj.balance_at(FundAccountId::new(), at(6)), None);
    }

    #[test]
    fn voucher_filters_apply() {
        let proj = projection();
        let account_id = open_and_move_money(&proj);

        let payments = proj.vouchers(VoucherFilter {
            account_id: Some(account_id),
            kind: Some(VoucherKind::Payment),
            ..VoucherFilter::default()
        });
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, 25);
    }
}
