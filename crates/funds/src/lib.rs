//! Cash-fund domain module (event-sourced).
//!
//! A fund account is a cash or bank box with an opening balance; money moves
//! through receipt (inflow) and payment (outflow) vouchers. Payments cannot
//! overdraw the account.

pub mod fund;

pub use fund::{
    AccountOpened, FundAccount, FundAccountKind, FundCommand, FundEvent, OpenAccount,
    RecordVoucher, VoucherKind, VoucherRecorded,
};
