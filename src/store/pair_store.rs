//! The authoritative in-memory snapshot of one pair's transactions.
//!
//! The store shields aggregation and UI consumers from the backend's raw
//! record shape: it normalizes, deduplicates, and keeps the snapshot sorted
//! newest-first. Reads get one automatic retry with a reduced query;
//! superseded in-flight loads are discarded by completion-time
//! last-write-wins.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::errors::LedgerError;
use crate::ledger::{PartyId, PeriodKind, PeriodStamp, Transaction, TransactionPatch};

use super::backend::{PairBackend, RawRecord, SnapshotListener, Subscription};

type Watcher = Box<dyn Fn(&[Transaction]) + Send + Sync>;

/// Token returned by [`PairStore::watch`], used to unregister the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherToken(usize);

#[derive(Default)]
struct StoreState {
    pair_id: Option<String>,
    items: Vec<Transaction>,
    loaded: bool,
    loading: bool,
    /// Ticket of the most recently started load.
    issued: u64,
    /// Ticket of the load whose result the snapshot currently reflects.
    applied: u64,
}

/// Owns a pair's transaction snapshot and mediates create/update/delete
/// against the persistence collaborator.
pub struct PairStore {
    backend: Arc<dyn PairBackend>,
    state: Mutex<StoreState>,
    watchers: Mutex<Vec<Option<Watcher>>>,
}

impl PairStore {
    pub fn new(backend: Arc<dyn PairBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState::default()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Fetches all non-archived transactions for `pair_id` and replaces the
    /// snapshot. A no-op when the pair is already loaded and `force` is not
    /// set. A failed fetch leaves the previous snapshot untouched. If a
    /// newer load completes first, this one's result is discarded silently.
    pub fn load_for_pair(&self, pair_id: &str, force: bool) -> Result<(), LedgerError> {
        let ticket = {
            let mut state = self.state.lock().unwrap();
            if !force && state.loaded && state.pair_id.as_deref() == Some(pair_id) {
                debug!(pair_id, "snapshot already loaded, skipping fetch");
                return Ok(());
            }
            state.issued += 1;
            state.loading = true;
            state.issued
        };

        let records = match self.fetch_with_fallback(pair_id) {
            Ok(records) => records,
            Err(err) => {
                let mut state = self.state.lock().unwrap();
                if state.issued == ticket {
                    state.loading = false;
                }
                return Err(err);
            }
        };

        let items = normalize_records(records);
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            if ticket <= state.applied {
                debug!(pair_id, ticket, "discarding superseded load result");
                return Ok(());
            }
            state.pair_id = Some(pair_id.to_string());
            state.items = items;
            state.loaded = true;
            state.loading = state.issued != ticket;
            state.applied = ticket;
            state.items.clone()
        };
        info!(pair_id, count = snapshot.len(), "snapshot loaded");
        self.notify(&snapshot);
        Ok(())
    }

    /// Re-fetches the currently loaded pair, bypassing the cache. A no-op
    /// when nothing is loaded.
    pub fn refresh(&self) -> Result<(), LedgerError> {
        let pair_id = self.state.lock().unwrap().pair_id.clone();
        match pair_id {
            Some(pair_id) => self.load_for_pair(&pair_id, true),
            None => Ok(()),
        }
    }

    /// Merges one transaction into the snapshot without a round trip, used
    /// after a write already confirmed elsewhere. Replaces any existing
    /// entry with the same id and re-sorts. Ignored when the transaction
    /// belongs to a different pair than the loaded one.
    pub fn upsert_local(&self, tx: Transaction) {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            match state.pair_id.as_deref() {
                Some(current) if current == tx.pair_id => {}
                Some(current) => {
                    warn!(
                        tx_pair = %tx.pair_id,
                        loaded_pair = %current,
                        "ignoring upsert for a different pair"
                    );
                    return;
                }
                None => {
                    warn!(tx_pair = %tx.pair_id, "ignoring upsert, no pair loaded");
                    return;
                }
            }
            match state.items.iter_mut().find(|t| t.id == tx.id) {
                Some(existing) => *existing = tx,
                None => state.items.push(tx),
            }
            state.items.sort_by(cmp_desc);
            state.items.clone()
        };
        self.notify(&snapshot);
    }

    /// Persists a description/amount edit, then mirrors it into the
    /// snapshot. The local mutation applies only after the backend
    /// confirms.
    pub fn update_transaction(&self, patch: TransactionPatch) -> Result<(), LedgerError> {
        let patch = patch.normalized()?;
        {
            let state = self.state.lock().unwrap();
            if !state.items.iter().any(|t| t.id == patch.id) {
                return Err(LedgerError::not_found(&patch.id));
            }
        }
        self.backend.update(&patch)?;
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            if let Some(tx) = state.items.iter_mut().find(|t| t.id == patch.id) {
                tx.apply_patch(&patch);
            }
            state.items.sort_by(cmp_desc);
            state.items.clone()
        };
        self.notify(&snapshot);
        Ok(())
    }

    /// Persists a deletion, then removes the item from the snapshot.
    pub fn delete_transaction(&self, id: &str) -> Result<(), LedgerError> {
        {
            let state = self.state.lock().unwrap();
            if !state.items.iter().any(|t| t.id == id) {
                return Err(LedgerError::not_found(id));
            }
        }
        self.backend.delete(id)?;
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            state.items.retain(|t| t.id != id);
            state.items.clone()
        };
        self.notify(&snapshot);
        Ok(())
    }

    /// Clears the snapshot and flags; used on sign-out or pair switch.
    /// Invalidates any in-flight load so its result cannot resurface.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.pair_id = None;
            state.items.clear();
            state.loaded = false;
            state.loading = false;
            state.issued += 1;
            state.applied = state.issued;
        }
        self.notify(&[]);
    }

    /// Read-through query for one period of a pair's history. Does not
    /// touch the snapshot.
    pub fn load_period(
        &self,
        pair_id: &str,
        kind: PeriodKind,
        period_id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let records = match self.backend.fetch_pair_period(pair_id, kind, period_id) {
            Ok(records) => records,
            Err(err) if err.is_store_error() => {
                warn!(%err, pair_id, period_id, "period fetch failed, retrying once");
                self.backend.fetch_pair_period(pair_id, kind, period_id)?
            }
            Err(err) => return Err(err),
        };
        Ok(normalize_records(records))
    }

    /// Repairs a pair's historical records in one batch: lowercases party
    /// fields, re-derives the normalized `day`/`week`/`month` ids (and
    /// re-aligns `date`), and materializes a missing `archived` flag.
    /// Returns the number of records that needed repair.
    pub fn backfill_periods(&self, pair_id: &str) -> Result<usize, LedgerError> {
        let records = self.fetch_with_fallback(pair_id)?;
        let repaired: Vec<RawRecord> = records
            .into_iter()
            .filter_map(repair_record)
            .collect();
        if repaired.is_empty() {
            info!(pair_id, "backfill found nothing to repair");
            return Ok(0);
        }
        self.backend.update_batch(&repaired)?;
        info!(pair_id, count = repaired.len(), "backfill repaired records");
        Ok(repaired.len())
    }

    /// Wires a live backend subscription into the store. Incoming
    /// deliveries replace the full slice atomically; deliveries for a pair
    /// other than the loaded one are ignored. Dropping the returned handle
    /// cancels the subscription.
    pub fn connect_live(self: &Arc<Self>, pair_id: &str) -> Result<LiveHandle, LedgerError> {
        let store = Arc::downgrade(self);
        let pair = pair_id.to_string();
        let listener: SnapshotListener = Arc::new(move |records| {
            if let Some(store) = store.upgrade() {
                store.apply_push(&pair, records);
            }
        });
        let subscription = self.backend.subscribe(pair_id, listener)?;
        Ok(LiveHandle {
            subscription: Some(subscription),
        })
    }

    /// Registers a watcher called with the new snapshot after every applied
    /// mutation.
    pub fn watch(&self, watcher: impl Fn(&[Transaction]) + Send + Sync + 'static) -> WatcherToken {
        let mut watchers = self.watchers.lock().unwrap();
        watchers.push(Some(Box::new(watcher)));
        WatcherToken(watchers.len() - 1)
    }

    pub fn unwatch(&self, token: WatcherToken) {
        let mut watchers = self.watchers.lock().unwrap();
        if let Some(slot) = watchers.get_mut(token.0) {
            *slot = None;
        }
    }

    /// A copy of the current snapshot, newest first.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn pair_id(&self) -> Option<String> {
        self.state.lock().unwrap().pair_id.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().unwrap().loaded
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    /// Convenience: the balance fold over the current snapshot.
    pub fn balance(&self, self_party: &PartyId, partner: &PartyId) -> crate::ledger::BalanceSummary {
        let state = self.state.lock().unwrap();
        crate::ledger::compute_balance(&state.items, self_party, partner)
    }

    fn apply_push(&self, pair_id: &str, records: Vec<RawRecord>) {
        let items = normalize_records(records);
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            match state.pair_id.as_deref() {
                Some(current) if current != pair_id => {
                    debug!(pair_id, current, "ignoring push for a non-current pair");
                    return;
                }
                _ => {}
            }
            state.pair_id = Some(pair_id.to_string());
            state.items = items;
            state.loaded = true;
            state.loading = false;
            // A push is the freshest view; stale in-flight pulls must not
            // overwrite it.
            state.applied = state.issued;
            state.items.clone()
        };
        debug!(pair_id, count = snapshot.len(), "applied push snapshot");
        self.notify(&snapshot);
    }

    fn fetch_with_fallback(&self, pair_id: &str) -> Result<Vec<RawRecord>, LedgerError> {
        match self.backend.fetch_pair(pair_id, true) {
            Ok(records) => Ok(records),
            Err(err) if err.is_store_error() => {
                warn!(%err, pair_id, "ordered fetch failed, retrying without secondary sort");
                self.backend.fetch_pair(pair_id, false)
            }
            Err(err) => Err(err),
        }
    }

    fn notify(&self, snapshot: &[Transaction]) {
        let watchers = self.watchers.lock().unwrap();
        for watcher in watchers.iter().flatten() {
            watcher(snapshot);
        }
    }
}

/// A live query registration; canceling or dropping it stops deliveries.
pub struct LiveHandle {
    subscription: Option<Box<dyn Subscription>>,
}

impl LiveHandle {
    pub fn cancel(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Newest first: `date` descending, `created_at` descending as tie-break.
fn cmp_desc(a: &Transaction, b: &Transaction) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn normalize_records(records: Vec<RawRecord>) -> Vec<Transaction> {
    let mut items: Vec<Transaction> = records
        .into_iter()
        .filter_map(|record| match record.into_transaction() {
            Ok(tx) if tx.archived => None,
            Ok(tx) => Some(tx),
            Err(err) => {
                warn!(%err, "excluding malformed record from snapshot");
                None
            }
        })
        .collect();
    items.sort_by(cmp_desc);
    items
}

fn repair_record(record: RawRecord) -> Option<RawRecord> {
    let mut next = record.clone();

    if let Some(user) = &next.user {
        next.user = Some(user.trim().to_lowercase());
    }
    if let Some(from) = &next.from {
        next.from = Some(from.trim().to_lowercase());
    }
    if let Some(to) = &next.to {
        next.to = Some(to.trim().to_lowercase());
    }

    let base = next
        .date
        .as_deref()
        .and_then(|d| crate::ledger::parse_day_id(d).ok())
        .or_else(|| {
            chrono::DateTime::from_timestamp_millis(next.created_at_ms)
                .map(|dt| dt.date_naive())
        })
        .unwrap_or_else(|| Utc::now().date_naive());
    let stamp = PeriodStamp::of(base);
    next.date = Some(stamp.day.clone());
    next.day = Some(stamp.day.clone());
    next.week = Some(stamp.week.clone());
    next.month = Some(stamp.month.clone());

    if next.archived.is_none() {
        next.archived = Some(false);
    }

    (next != record).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, date: &str, created_at_ms: i64) -> RawRecord {
        RawRecord {
            id: id.into(),
            pair_id: "p1".into(),
            kind: Some("purchase".into()),
            user: Some("ada@example.com".into()),
            from: None,
            to: None,
            amount: 10.0,
            description: None,
            date: Some(date.into()),
            shared: true,
            is_private: false,
            created_at_ms,
            archived: Some(false),
            day: None,
            week: None,
            month: None,
        }
    }

    #[test]
    fn normalization_sorts_newest_first_and_drops_bad_records() {
        let mut bad = record("bad", "2025-01-02", 10);
        bad.kind = Some("refund".into());
        let items = normalize_records(vec![
            record("older", "2025-01-01", 10),
            bad,
            record("newer", "2025-01-02", 20),
            record("same-day-earlier", "2025-01-02", 5),
        ]);
        let ids: Vec<&str> = items.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["newer", "same-day-earlier", "older"]);
    }

    #[test]
    fn repair_fills_periods_and_archived_flag() {
        let mut raw = record("t1", "2023-01-01", 10);
        raw.user = Some("  Ada@Example.COM ".into());
        raw.archived = None;
        let repaired = repair_record(raw).expect("needs repair");
        assert_eq!(repaired.user.as_deref(), Some("ada@example.com"));
        assert_eq!(repaired.day.as_deref(), Some("2023-01-01"));
        assert_eq!(repaired.week.as_deref(), Some("2022-W52"));
        assert_eq!(repaired.month.as_deref(), Some("2023-01"));
        assert_eq!(repaired.archived, Some(false));
    }

    #[test]
    fn repair_skips_already_normalized_records() {
        let mut raw = record("t1", "2025-06-15", 10);
        raw.day = Some("2025-06-15".into());
        raw.week = Some("2025-W24".into());
        raw.month = Some("2025-06".into());
        assert!(repair_record(raw).is_none());
    }
}
