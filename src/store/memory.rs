//! In-memory [`PairBackend`]: the crate's reference backend, used by tests
//! and embeddings that do not need durable persistence. Supports the full
//! query surface plus per-pair push listeners.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::LedgerError;
use crate::ledger::{PeriodKind, TransactionPatch};

use super::backend::{PairBackend, RawRecord, SnapshotListener, Subscription};

#[derive(Default)]
struct MemoryState {
    records: Vec<RawRecord>,
    listeners: HashMap<u64, (String, SnapshotListener)>,
    next_listener: u64,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record directly, bypassing notification; handy for tests.
    pub fn seed(&self, record: RawRecord) {
        self.state.lock().unwrap().records.push(record);
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    fn pair_slice(state: &MemoryState, pair_id: &str, ordered: bool) -> Vec<RawRecord> {
        let mut slice: Vec<RawRecord> = state
            .records
            .iter()
            .filter(|r| r.pair_id == pair_id && !r.archived.unwrap_or(false))
            .cloned()
            .collect();
        if ordered {
            slice.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        }
        slice
    }

    fn notify_pair(&self, pair_id: &str) {
        let deliveries: Vec<(SnapshotListener, Vec<RawRecord>)> = {
            let state = self.state.lock().unwrap();
            state
                .listeners
                .values()
                .filter(|(pair, _)| pair == pair_id)
                .map(|(pair, listener)| {
                    (listener.clone(), Self::pair_slice(&state, pair, true))
                })
                .collect()
        };
        for (listener, slice) in deliveries {
            listener(slice);
        }
    }
}

impl PairBackend for MemoryBackend {
    fn fetch_pair(
        &self,
        pair_id: &str,
        order_by_created_desc: bool,
    ) -> Result<Vec<RawRecord>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(Self::pair_slice(&state, pair_id, order_by_created_desc))
    }

    fn fetch_pair_period(
        &self,
        pair_id: &str,
        kind: PeriodKind,
        period_id: &str,
    ) -> Result<Vec<RawRecord>, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(Self::pair_slice(&state, pair_id, true)
            .into_iter()
            .filter(|r| {
                let field = match kind {
                    PeriodKind::Day => &r.day,
                    PeriodKind::Week => &r.week,
                    PeriodKind::Month => &r.month,
                };
                field.as_deref() == Some(period_id)
            })
            .collect())
    }

    fn create(&self, record: &RawRecord) -> Result<(), LedgerError> {
        let pair_id = {
            let mut state = self.state.lock().unwrap();
            if state.records.iter().any(|r| r.id == record.id) {
                return Err(LedgerError::validation(format!(
                    "record {} already exists",
                    record.id
                )));
            }
            state.records.push(record.clone());
            record.pair_id.clone()
        };
        self.notify_pair(&pair_id);
        Ok(())
    }

    fn update(&self, patch: &TransactionPatch) -> Result<(), LedgerError> {
        let pair_id = {
            let mut state = self.state.lock().unwrap();
            let record = state
                .records
                .iter_mut()
                .find(|r| r.id == patch.id)
                .ok_or_else(|| LedgerError::not_found(&patch.id))?;
            if let Some(description) = &patch.description {
                record.description = Some(description.clone());
            }
            if let Some(amount) = patch.amount {
                record.amount = amount;
            }
            record.pair_id.clone()
        };
        self.notify_pair(&pair_id);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), LedgerError> {
        let pair_id = {
            let mut state = self.state.lock().unwrap();
            let index = state
                .records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| LedgerError::not_found(id))?;
            state.records.remove(index).pair_id
        };
        self.notify_pair(&pair_id);
        Ok(())
    }

    fn update_batch(&self, records: &[RawRecord]) -> Result<(), LedgerError> {
        let mut pairs: Vec<String> = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            for incoming in records {
                match state.records.iter_mut().find(|r| r.id == incoming.id) {
                    Some(existing) => *existing = incoming.clone(),
                    None => state.records.push(incoming.clone()),
                }
                if !pairs.contains(&incoming.pair_id) {
                    pairs.push(incoming.pair_id.clone());
                }
            }
        }
        for pair_id in pairs {
            self.notify_pair(&pair_id);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        pair_id: &str,
        listener: SnapshotListener,
    ) -> Result<Box<dyn Subscription>, LedgerError> {
        let (key, initial) = {
            let mut state = self.state.lock().unwrap();
            let key = state.next_listener;
            state.next_listener += 1;
            state
                .listeners
                .insert(key, (pair_id.to_string(), listener.clone()));
            (key, Self::pair_slice(&state, pair_id, true))
        };
        // Mirrors a snapshot listener's initial delivery.
        listener(initial);
        Ok(Box::new(MemorySubscription {
            state: Arc::clone(&self.state),
            key: Some(key),
        }))
    }
}

struct MemorySubscription {
    state: Arc<Mutex<MemoryState>>,
    key: Option<u64>,
}

impl Subscription for MemorySubscription {
    fn cancel(&mut self) {
        if let Some(key) = self.key.take() {
            self.state.lock().unwrap().listeners.remove(&key);
        }
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
