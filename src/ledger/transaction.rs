//! The transaction entity: one money-moving event belonging to exactly
//! one pair.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::party::PartyId;
use crate::errors::LedgerError;

/// Which parties a transaction moves value between, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionKind {
    /// One party paid; `shared` purchases count toward the joint pool,
    /// `private` ones are visible only to the actor.
    Purchase {
        actor: PartyId,
        shared: bool,
        private: bool,
    },
    /// A direct transfer settling balance between the two parties.
    Payment { from: PartyId, to: PartyId },
    /// A direct contribution from the giver toward the receiver, tracked on
    /// the giver's direct side rather than the shared side.
    Gift { actor: PartyId, to: PartyId },
}

/// How a purchase entry form scopes the spend. Shared and private are
/// mutually exclusive by construction here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseScope {
    Shared,
    Personal,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub pair_id: String,
    #[serde(flatten)]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub archived: bool,
}

impl Transaction {
    /// Records a purchase by `actor`, scoped per the entry form.
    pub fn purchase(
        pair_id: &str,
        actor: PartyId,
        scope: PurchaseScope,
        amount: f64,
        description: Option<String>,
        date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let kind = TransactionKind::Purchase {
            actor,
            shared: matches!(scope, PurchaseScope::Shared),
            private: matches!(scope, PurchaseScope::Private),
        };
        Self::create(pair_id, kind, amount, description, date)
    }

    /// Records a direct payment from one party to the other.
    pub fn payment(
        pair_id: &str,
        from: PartyId,
        to: PartyId,
        amount: f64,
        date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        if from == to {
            return Err(LedgerError::validation(format!(
                "payment from and to must differ, got {from}"
            )));
        }
        Self::create(pair_id, TransactionKind::Payment { from, to }, amount, None, date)
    }

    /// Records a gift from `actor` to `to`.
    pub fn gift(
        pair_id: &str,
        actor: PartyId,
        to: PartyId,
        amount: f64,
        description: Option<String>,
        date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        if actor == to {
            return Err(LedgerError::validation(format!(
                "gift giver and receiver must differ, got {actor}"
            )));
        }
        Self::create(pair_id, TransactionKind::Gift { actor, to }, amount, description, date)
    }

    fn create(
        pair_id: &str,
        kind: TransactionKind,
        amount: f64,
        description: Option<String>,
        date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            pair_id: pair_id.to_string(),
            kind,
            amount: check_amount(amount)?,
            description,
            date,
            created_at: Utc::now(),
            archived: false,
        })
    }

    /// Applies a confirmed description/amount edit. The amount must already
    /// be validated; kind, parties, and date are immutable post-creation.
    pub fn apply_patch(&mut self, patch: &TransactionPatch) {
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
    }
}

/// The only legal post-creation edit: description and/or amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl TransactionPatch {
    /// Validates and rounds the amount edit, leaving other fields as-is.
    pub fn normalized(mut self) -> Result<Self, LedgerError> {
        if let Some(amount) = self.amount {
            self.amount = Some(check_amount(amount)?);
        }
        Ok(self)
    }
}

/// Rounds a currency value to cent precision.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses user-entered money: strips commas and spaces, requires a finite
/// value strictly greater than zero, and rounds to cents.
pub fn parse_money(input: &str) -> Result<f64, LedgerError> {
    let cleaned: String = input.chars().filter(|c| *c != ',' && *c != ' ').collect();
    let value: f64 = cleaned
        .parse()
        .map_err(|_| LedgerError::validation(format!("not a number: {input}")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(LedgerError::validation(format!(
            "amount must be positive: {input}"
        )));
    }
    Ok(round_cents(value))
}

fn check_amount(amount: f64) -> Result<f64, LedgerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LedgerError::validation(format!(
            "amount must be non-negative: {amount}"
        )));
    }
    Ok(round_cents(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn purchase_scope_never_produces_shared_and_private() {
        for scope in [PurchaseScope::Shared, PurchaseScope::Personal, PurchaseScope::Private] {
            let tx = Transaction::purchase(
                "p1",
                PartyId::new("ada@example.com"),
                scope,
                12.5,
                None,
                date(2025, 3, 1),
            )
            .unwrap();
            match tx.kind {
                TransactionKind::Purchase { shared, private, .. } => {
                    assert!(!(shared && private))
                }
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn amounts_are_rounded_to_cents_at_entry() {
        let tx = Transaction::purchase(
            "p1",
            PartyId::new("ada@example.com"),
            PurchaseScope::Shared,
            10.005,
            Some("groceries".into()),
            date(2025, 3, 1),
        )
        .unwrap();
        assert_eq!(tx.amount, 10.01);
        assert!(!tx.archived);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let err = Transaction::payment(
            "p1",
            PartyId::new("ada@example.com"),
            PartyId::new("brian@example.com"),
            -5.0,
            date(2025, 3, 1),
        );
        assert!(matches!(err, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn payment_to_self_is_rejected() {
        let err = Transaction::payment(
            "p1",
            PartyId::new("Ada@example.com"),
            PartyId::new("ada@example.com"),
            5.0,
            date(2025, 3, 1),
        );
        assert!(err.is_err());
    }

    #[test]
    fn parse_money_handles_separators_and_rejects_junk() {
        assert_eq!(parse_money("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_money(" 20 ").unwrap(), 20.0);
        assert!(parse_money("0").is_err());
        assert!(parse_money("-3").is_err());
        assert!(parse_money("abc").is_err());
    }

    #[test]
    fn patch_normalization_rounds_and_validates() {
        let patch = TransactionPatch {
            id: "t1".into(),
            description: Some("dinner".into()),
            amount: Some(19.999),
        }
        .normalized()
        .unwrap();
        assert_eq!(patch.amount, Some(20.0));

        let bad = TransactionPatch {
            id: "t1".into(),
            description: None,
            amount: Some(f64::NAN),
        }
        .normalized();
        assert!(bad.is_err());
    }
}
