//! Ledger domain: identities, transactions, classifiers, balance
//! reconciliation, and calendar period bucketing.

pub mod balance;
pub mod classify;
pub mod party;
pub mod period;
pub mod transaction;

pub use balance::{compute_balance, BalanceSummary, Settlement};
pub use classify::LogScope;
pub use party::{join_code, Pair, PartyId};
pub use period::{
    current_period_id, label_period, parse_day_id, parse_month_id, parse_week_id, period_id_for,
    shift_period, to_day_id, to_month_id, to_week_id, PeriodKind, PeriodStamp,
};
pub use transaction::{
    parse_money, round_cents, PurchaseScope, Transaction, TransactionKind, TransactionPatch,
};
