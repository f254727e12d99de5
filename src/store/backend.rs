//! The persistence seam: the raw record shape stored by the backend and
//! the trait the snapshot store drives it through.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;
use crate::ledger::{
    to_day_id, PartyId, PeriodKind, PeriodStamp, Transaction, TransactionKind, TransactionPatch,
};

/// One persisted transaction record, in the flat wire shape the backend
/// stores: a `type` discriminator plus optional party fields, with the
/// normalized period ids alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    pub pair_id: String,
    /// Missing on the oldest records, which are purchases.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub created_at_ms: i64,
    /// Absent on records written before soft deletion existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
}

impl RawRecord {
    /// Validates and normalizes a wire record into the domain entity.
    /// Unknown `type` values and unparseable dates are validation errors;
    /// load paths exclude such records rather than failing the snapshot.
    pub fn into_transaction(self) -> Result<Transaction, LedgerError> {
        let kind = match self.kind.as_deref() {
            None | Some("purchase") => TransactionKind::Purchase {
                actor: required_party(&self.user, &self.id, "user")?,
                shared: self.shared,
                private: self.is_private,
            },
            Some("payment") => TransactionKind::Payment {
                from: required_party(&self.from, &self.id, "from")?,
                to: required_party(&self.to, &self.id, "to")?,
            },
            Some("gift") => TransactionKind::Gift {
                actor: required_party(&self.user, &self.id, "user")?,
                to: required_party(&self.to, &self.id, "to")?,
            },
            Some(other) => {
                return Err(LedgerError::validation(format!(
                    "record {}: unknown kind {other:?}",
                    self.id
                )))
            }
        };

        let date_str = self.date.as_deref().ok_or_else(|| {
            LedgerError::validation(format!("record {}: missing date", self.id))
        })?;
        let date = crate::ledger::parse_day_id(date_str)
            .map_err(|_| LedgerError::validation(format!("record {}: bad date {date_str:?}", self.id)))?;

        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(LedgerError::validation(format!(
                "record {}: bad amount {}",
                self.id, self.amount
            )));
        }

        Ok(Transaction {
            id: self.id,
            pair_id: self.pair_id,
            kind,
            amount: self.amount,
            description: self.description,
            date,
            created_at: millis_to_instant(self.created_at_ms),
            archived: self.archived.unwrap_or(false),
        })
    }

    /// The wire shape of a domain transaction, period stamps included.
    pub fn from_transaction(tx: &Transaction) -> Self {
        let (kind, user, from, to, shared, is_private) = match &tx.kind {
            TransactionKind::Purchase { actor, shared, private } => (
                "purchase",
                Some(actor.to_string()),
                None,
                None,
                *shared,
                *private,
            ),
            TransactionKind::Payment { from, to } => (
                "payment",
                None,
                Some(from.to_string()),
                Some(to.to_string()),
                true,
                false,
            ),
            TransactionKind::Gift { actor, to } => (
                "gift",
                Some(actor.to_string()),
                None,
                Some(to.to_string()),
                false,
                false,
            ),
        };
        let stamp = PeriodStamp::of(tx.date);
        Self {
            id: tx.id.clone(),
            pair_id: tx.pair_id.clone(),
            kind: Some(kind.to_string()),
            user,
            from,
            to,
            amount: tx.amount,
            description: tx.description.clone(),
            date: Some(to_day_id(tx.date)),
            shared,
            is_private,
            created_at_ms: tx.created_at.timestamp_millis(),
            archived: Some(tx.archived),
            day: Some(stamp.day),
            week: Some(stamp.week),
            month: Some(stamp.month),
        }
    }
}

fn required_party(field: &Option<String>, id: &str, name: &str) -> Result<PartyId, LedgerError> {
    match field {
        Some(raw) if !raw.trim().is_empty() => Ok(PartyId::new(raw)),
        _ => Err(LedgerError::validation(format!(
            "record {id}: missing {name}"
        ))),
    }
}

fn millis_to_instant(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Receives the full replacement slice for a pair on every push delivery.
pub type SnapshotListener = Arc<dyn Fn(Vec<RawRecord>) + Send + Sync>;

/// A live query registration. Canceling (or dropping the handle) stops
/// further deliveries.
pub trait Subscription: Send {
    fn cancel(&mut self);
}

/// Abstraction over the persistence collaborator holding a pair's records.
///
/// `fetch_pair` returns only non-archived records and, when asked, orders
/// them by creation time descending; backends without the compound index
/// report `StoreErrorKind::IndexMissing` for the ordered form.
pub trait PairBackend: Send + Sync {
    fn fetch_pair(
        &self,
        pair_id: &str,
        order_by_created_desc: bool,
    ) -> Result<Vec<RawRecord>, LedgerError>;

    fn fetch_pair_period(
        &self,
        pair_id: &str,
        kind: PeriodKind,
        period_id: &str,
    ) -> Result<Vec<RawRecord>, LedgerError>;

    fn create(&self, record: &RawRecord) -> Result<(), LedgerError>;

    fn update(&self, patch: &TransactionPatch) -> Result<(), LedgerError>;

    fn delete(&self, id: &str) -> Result<(), LedgerError>;

    /// Applies every record in one batch; used by backfill migrations.
    fn update_batch(&self, records: &[RawRecord]) -> Result<(), LedgerError>;

    /// Registers a live query for a pair. Optional; the default reports the
    /// capability as unavailable.
    fn subscribe(
        &self,
        pair_id: &str,
        listener: SnapshotListener,
    ) -> Result<Box<dyn Subscription>, LedgerError> {
        let _ = (pair_id, listener);
        Err(LedgerError::unavailable(
            "backend does not support live subscriptions",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_json() -> serde_json::Value {
        serde_json::json!({
            "id": "t1",
            "pairId": "p1",
            "type": "payment",
            "from": "Ada@Example.com",
            "to": "brian@example.com",
            "amount": 30.0,
            "date": "2025-01-02",
            "createdAtMs": 1735_800_000_000i64
        })
    }

    #[test]
    fn wire_records_decode_with_camel_case_fields() {
        let record: RawRecord = serde_json::from_value(payment_json()).unwrap();
        let tx = record.into_transaction().unwrap();
        assert!(tx.is_payment_from(&PartyId::new("ada@example.com")));
        assert!(!tx.archived);
    }

    #[test]
    fn missing_type_defaults_to_purchase() {
        let record: RawRecord = serde_json::from_value(serde_json::json!({
            "id": "t2",
            "pairId": "p1",
            "user": "ada@example.com",
            "amount": 12.0,
            "date": "2025-01-02",
            "shared": true
        }))
        .unwrap();
        let tx = record.into_transaction().unwrap();
        assert!(matches!(tx.kind, TransactionKind::Purchase { shared: true, .. }));
    }

    #[test]
    fn unknown_kind_is_a_validation_error() {
        let mut value = payment_json();
        value["type"] = "refund".into();
        let record: RawRecord = serde_json::from_value(value).unwrap();
        assert!(matches!(
            record.into_transaction(),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn round_trip_preserves_the_entity_and_stamps_periods() {
        let tx = Transaction::gift(
            "p1",
            PartyId::new("ada@example.com"),
            PartyId::new("brian@example.com"),
            40.0,
            Some("birthday".into()),
            chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        )
        .unwrap();
        let record = RawRecord::from_transaction(&tx);
        assert_eq!(record.day.as_deref(), Some("2023-01-01"));
        assert_eq!(record.week.as_deref(), Some("2022-W52"));
        assert_eq!(record.month.as_deref(), Some("2023-01"));

        let back = record.into_transaction().unwrap();
        assert_eq!(back.id, tx.id);
        assert_eq!(back.kind, tx.kind);
        assert_eq!(back.amount, tx.amount);
        assert_eq!(back.date, tx.date);
    }
}
