use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::SharedClock;
use crate::events::{Subscribers, Subscription};
use crate::history::types::{TxRecord, TxUpdate};
use crate::observability::metrics;
use crate::storage::{StorageBackend, HISTORY_KEY};

/// Mapping of transaction id to record.
pub type TxHistory = BTreeMap<String, TxRecord>;

/// Persisted, observable log of submission attempts for one network.
pub struct TxLedger {
    storage: Arc<dyn StorageBackend>,
    clock: SharedClock,
    records: Mutex<TxHistory>,
    subscribers: Subscribers<TxRecord>,
}

impl TxLedger {
    /// Open the ledger kept in `storage`. Unreadable history starts empty.
    pub fn new(storage: Arc<dyn StorageBackend>, clock: SharedClock) -> Self {
        let records = match storage.load(HISTORY_KEY) {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding malformed transaction history");
                TxHistory::new()
            }),
            Ok(None) => TxHistory::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read transaction history");
                TxHistory::new()
            }
        };

        Self {
            storage,
            clock,
            records: Mutex::new(records),
            subscribers: Subscribers::new("tx"),
        }
    }

    /// Merge `update` into its record, persist, and notify.
    ///
    /// Returns the merged record, or `None` when the record is already final
    /// and the update was ignored.
    pub fn update_tx(&self, update: TxUpdate) -> Option<TxRecord> {
        let now = self.clock.now_ms();
        let tx_id = update.tx_id.clone();
        let status = update.status;

        let merged = {
            let mut records = self.lock();
            let mut record = match records.get(&tx_id) {
                Some(existing) if existing.final_state => {
                    tracing::warn!(
                        tx_id = %tx_id,
                        status = %existing.status,
                        attempted = ?status,
                        "Ignoring update to finalized transaction"
                    );
                    return None;
                }
                Some(existing) => existing.clone(),
                None => TxRecord::create(&update, now),
            };
            record.merge(update, now);
            records.insert(tx_id.clone(), record.clone());
            self.persist(&records);
            record
        };

        if let Some(status) = status {
            tracing::debug!(tx_id = %tx_id, status = %status, "Transaction updated");
            metrics::record_tx_status(status.as_str());
        }
        self.subscribers.notify(&merged);
        Some(merged)
    }

    pub fn get_history(&self) -> TxHistory {
        self.lock().clone()
    }

    pub fn get(&self, tx_id: &str) -> Option<TxRecord> {
        self.lock().get(tx_id).cloned()
    }

    pub fn clear_history(&self) {
        let mut records = self.lock();
        records.clear();
        if let Err(e) = self.storage.remove(HISTORY_KEY) {
            tracing::error!(error = %e, "Failed to clear persisted transaction history");
        }
    }

    /// Listen for every merged record.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TxRecord) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    fn persist(&self, records: &TxHistory) {
        let result = serde_json::to_value(records)
            .map_err(Into::into)
            .and_then(|value| self.storage.save(HISTORY_KEY, &value));
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to persist transaction history");
        }
    }

    fn lock(&self) -> MutexGuard<'_, TxHistory> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for TxLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxLedger")
            .field("records", &self.lock().len())
            .finish()
    }
}
