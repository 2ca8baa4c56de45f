//! Projections: disposable read models fed by published event envelopes.

pub mod catalog;
pub mod fund_balances;
pub mod movement_log;
pub mod stock_levels;
