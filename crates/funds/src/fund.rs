use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use depot_core::{Aggregate, AggregateRoot, DomainError, FundAccountId};
use depot_events::Event;

/// Where the money physically sits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundAccountKind {
    Cash,
    Bank,
}

/// Direction of a voucher.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    /// Money in.
    Receipt,
    /// Money out.
    Payment,
}

/// Aggregate root: FundAccount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundAccount {
    id: FundAccountId,
    name: String,
    kind: FundAccountKind,
    initial_balance: i64,
    balance: i64,
    version: u64,
    created: bool,
}

impl FundAccount {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: FundAccountId) -> Self {
        Self {
            id,
            name: String::new(),
            kind: FundAccountKind::Cash,
            initial_balance: 0,
            balance: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> FundAccountId {
        self.id
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }
}

impl AggregateRoot for FundAccount {
    type Id = FundAccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenAccount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub account_id: FundAccountId,
    pub name: String,
    pub kind: FundAccountKind,
    pub initial_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordVoucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVoucher {
    pub account_id: FundAccountId,
    pub voucher_id: Uuid,
    pub kind: VoucherKind,
    pub amount: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundCommand {
    OpenAccount(OpenAccount),
    RecordVoucher(RecordVoucher),
}

/// Event: AccountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub account_id: FundAccountId,
    pub name: String,
    pub kind: FundAccountKind,
    pub initial_balance: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherRecorded {
    pub account_id: FundAccountId,
    pub voucher_id: Uuid,
    pub kind: VoucherKind,
    pub amount: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundEvent {
    AccountOpened(AccountOpened),
    VoucherRecorded(VoucherRecorded),
}

impl Event for FundEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FundEvent::AccountOpened(_) => "funds.account.opened",
            FundEvent::VoucherRecorded(_) => "funds.account.voucher_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FundEvent::AccountOpened(e) => e.occurred_at,
            FundEvent::VoucherRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for FundAccount {
    type Command = FundCommand;
    type Event = FundEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FundEvent::AccountOpened(e) => {
                self.id = e.account_id;
                self.name = e.name.clone();
                self.kind = e.kind;
                self.initial_balance = e.initial_balance;
                self.balance = e.initial_balance;
                self.created = true;
            }
            FundEvent::VoucherRecorded(e) => match e.kind {
                VoucherKind::Receipt => self.balance += e.amount,
                VoucherKind::Payment => self.balance -= e.amount,
            },
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FundCommand::OpenAccount(cmd) => self.handle_open(cmd),
            FundCommand::RecordVoucher(cmd) => self.handle_voucher(cmd),
        }
    }
}

impl FundAccount {
    fn handle_open(&self, cmd: &OpenAccount) -> Result<Vec<FundEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("account already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.initial_balance < 0 {
            return Err(DomainError::validation("initial balance cannot be negative"));
        }

        Ok(vec![FundEvent::AccountOpened(AccountOpened {
            account_id: cmd.account_id,
            name: cmd.name.clone(),
            kind: cmd.kind,
            initial_balance: cmd.initial_balance,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_voucher(&self, cmd: &RecordVoucher) -> Result<Vec<FundEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if cmd.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }

        if cmd.kind == VoucherKind::Payment && self.balance < cmd.amount {
            return Err(DomainError::InsufficientFunds {
                requested: cmd.amount,
                available: self.balance,
            });
        }

        Ok(vec![FundEvent::VoucherRecorded(VoucherRecorded {
            account_id: cmd.account_id,
            voucher_id: cmd.voucher_id,
            kind: cmd.kind,
            amount: cmd.amount,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
