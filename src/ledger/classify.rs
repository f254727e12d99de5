//! Classification predicates over transactions. These are filters, not
//! mutators: every reporting surface (home balance, totals, stats, logs)
//! selects through them so the ledger categories stay consistent.

use serde::{Deserialize, Serialize};

use super::period::{self, PeriodKind};
use super::party::PartyId;
use super::transaction::{Transaction, TransactionKind};

/// The purchase-only buckets shown by the logs surface. Payments and gifts
/// have no log scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogScope {
    Shared,
    Personal,
    Private,
}

impl Transaction {
    pub fn is_shared_purchase_by(&self, party: &PartyId) -> bool {
        matches!(
            &self.kind,
            TransactionKind::Purchase { actor, shared: true, .. } if actor == party
        )
    }

    pub fn is_personal_purchase_by(&self, party: &PartyId) -> bool {
        matches!(
            &self.kind,
            TransactionKind::Purchase { actor, shared: false, private: false } if actor == party
        )
    }

    pub fn is_private_purchase_by(&self, party: &PartyId) -> bool {
        matches!(
            &self.kind,
            TransactionKind::Purchase { actor, private: true, .. } if actor == party
        )
    }

    pub fn is_payment_from(&self, party: &PartyId) -> bool {
        matches!(&self.kind, TransactionKind::Payment { from, .. } if from == party)
    }

    pub fn is_payment_to(&self, party: &PartyId) -> bool {
        matches!(&self.kind, TransactionKind::Payment { to, .. } if to == party)
    }

    pub fn is_gift_from(&self, party: &PartyId) -> bool {
        matches!(&self.kind, TransactionKind::Gift { actor, .. } if actor == party)
    }

    pub fn is_gift_to(&self, party: &PartyId) -> bool {
        matches!(&self.kind, TransactionKind::Gift { to, .. } if to == party)
    }

    /// Visible in the joint/shared log: payments, gifts, and shared
    /// purchases.
    pub fn belongs_to_shared_view(&self) -> bool {
        match &self.kind {
            TransactionKind::Payment { .. } | TransactionKind::Gift { .. } => true,
            TransactionKind::Purchase { shared, .. } => *shared,
        }
    }

    /// Which logs bucket a purchase lands in; `None` for payments and gifts.
    pub fn log_scope(&self) -> Option<LogScope> {
        match &self.kind {
            TransactionKind::Purchase { private: true, .. } => Some(LogScope::Private),
            TransactionKind::Purchase { shared: true, .. } => Some(LogScope::Shared),
            TransactionKind::Purchase { .. } => Some(LogScope::Personal),
            _ => None,
        }
    }

    /// Whether the transaction's attribution date falls in the given period.
    pub fn in_period(&self, kind: PeriodKind, period_id: &str) -> bool {
        period::period_id_for(kind, self.date) == period_id
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::ledger::transaction::PurchaseScope;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ada() -> PartyId {
        PartyId::new("ada@example.com")
    }

    fn brian() -> PartyId {
        PartyId::new("brian@example.com")
    }

    #[test]
    fn purchase_scopes_classify_exclusively() {
        let shared =
            Transaction::purchase("p1", ada(), PurchaseScope::Shared, 10.0, None, date(2025, 1, 2))
                .unwrap();
        let personal =
            Transaction::purchase("p1", ada(), PurchaseScope::Personal, 10.0, None, date(2025, 1, 2))
                .unwrap();
        let private =
            Transaction::purchase("p1", ada(), PurchaseScope::Private, 10.0, None, date(2025, 1, 2))
                .unwrap();

        assert!(shared.is_shared_purchase_by(&ada()));
        assert!(!shared.is_personal_purchase_by(&ada()));
        assert!(!shared.is_private_purchase_by(&ada()));
        assert!(!shared.is_shared_purchase_by(&brian()));

        assert!(personal.is_personal_purchase_by(&ada()));
        assert!(!personal.is_shared_purchase_by(&ada()));

        assert!(private.is_private_purchase_by(&ada()));
        assert!(!private.is_personal_purchase_by(&ada()));

        assert_eq!(shared.log_scope(), Some(LogScope::Shared));
        assert_eq!(personal.log_scope(), Some(LogScope::Personal));
        assert_eq!(private.log_scope(), Some(LogScope::Private));
    }

    #[test]
    fn payments_and_gifts_classify_by_direction() {
        let payment = Transaction::payment("p1", ada(), brian(), 30.0, date(2025, 1, 2)).unwrap();
        assert!(payment.is_payment_from(&ada()));
        assert!(payment.is_payment_to(&brian()));
        assert!(!payment.is_payment_from(&brian()));
        assert!(payment.log_scope().is_none());

        let gift = Transaction::gift("p1", brian(), ada(), 40.0, None, date(2025, 1, 2)).unwrap();
        assert!(gift.is_gift_from(&brian()));
        assert!(gift.is_gift_to(&ada()));
        assert!(!gift.is_gift_from(&ada()));
        assert!(gift.log_scope().is_none());
    }

    #[test]
    fn shared_view_includes_payments_gifts_and_shared_purchases() {
        let shared =
            Transaction::purchase("p1", ada(), PurchaseScope::Shared, 10.0, None, date(2025, 1, 2))
                .unwrap();
        let personal =
            Transaction::purchase("p1", ada(), PurchaseScope::Personal, 10.0, None, date(2025, 1, 2))
                .unwrap();
        let payment = Transaction::payment("p1", ada(), brian(), 30.0, date(2025, 1, 2)).unwrap();
        let gift = Transaction::gift("p1", ada(), brian(), 40.0, None, date(2025, 1, 2)).unwrap();

        assert!(shared.belongs_to_shared_view());
        assert!(!personal.belongs_to_shared_view());
        assert!(payment.belongs_to_shared_view());
        assert!(gift.belongs_to_shared_view());
    }

    #[test]
    fn period_membership_follows_the_attribution_date() {
        let tx =
            Transaction::purchase("p1", ada(), PurchaseScope::Shared, 10.0, None, date(2025, 1, 2))
                .unwrap();
        assert!(tx.in_period(PeriodKind::Day, "2025-01-02"));
        assert!(tx.in_period(PeriodKind::Week, "2025-W01"));
        assert!(tx.in_period(PeriodKind::Month, "2025-01"));
        assert!(!tx.in_period(PeriodKind::Month, "2025-02"));
    }
}
