//! The balance reconciliation fold. Every surface that renders "who owes
//! whom" goes through [`compute_balance`] so the sums and the sign
//! convention cannot drift between views.

use serde::Serialize;

use super::party::PartyId;
use super::transaction::{round_cents, Transaction, TransactionKind};

/// The four canonical sums plus the signed net balance.
///
/// Sign convention: `net > 0` means self owes partner, `net < 0` means
/// partner owes self, `net == 0` means settled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BalanceSummary {
    pub shared_by_self: f64,
    pub shared_by_partner: f64,
    pub direct_to_self: f64,
    pub direct_to_partner: f64,
    pub net: f64,
}

/// Who owes whom, with the amount rounded to cents. Derived from the net
/// only here, so display surfaces cannot re-interpret the sign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settlement {
    SelfOwes(f64),
    PartnerOwes(f64),
    Even,
}

impl BalanceSummary {
    pub fn settlement(&self) -> Settlement {
        let net = round_cents(self.net);
        if net > 0.0 {
            Settlement::SelfOwes(net)
        } else if net < 0.0 {
            Settlement::PartnerOwes(-net)
        } else {
            Settlement::Even
        }
    }
}

/// Folds a transaction set into the canonical sums for `self_party` against
/// `partner`.
///
/// Each shared purchase is split 50/50, so the shared imbalance enters the
/// net halved. Payments and gifts move full value directly and enter at
/// full weight. Archived transactions are skipped. Pure, total, and
/// order-independent; rounding happens only at the settlement step.
pub fn compute_balance(
    transactions: &[Transaction],
    self_party: &PartyId,
    partner: &PartyId,
) -> BalanceSummary {
    let mut shared_by_self = 0.0;
    let mut shared_by_partner = 0.0;
    let mut direct_to_self = 0.0;
    let mut direct_to_partner = 0.0;

    for tx in transactions {
        if tx.archived {
            continue;
        }
        match &tx.kind {
            TransactionKind::Payment { from, .. } => {
                if from == self_party {
                    direct_to_self += tx.amount;
                } else if from == partner {
                    direct_to_partner += tx.amount;
                }
            }
            TransactionKind::Gift { actor, .. } => {
                if actor == self_party {
                    direct_to_self += tx.amount;
                } else if actor == partner {
                    direct_to_partner += tx.amount;
                }
            }
            TransactionKind::Purchase { actor, shared: true, .. } => {
                if actor == self_party {
                    shared_by_self += tx.amount;
                } else if actor == partner {
                    shared_by_partner += tx.amount;
                }
            }
            TransactionKind::Purchase { .. } => {}
        }
    }

    let net = (shared_by_partner - shared_by_self) / 2.0 + direct_to_partner - direct_to_self;

    BalanceSummary {
        shared_by_self,
        shared_by_partner,
        direct_to_self,
        direct_to_partner,
        net,
    }
}
