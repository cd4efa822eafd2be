//! Transaction record types and the status state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a submission attempt.
///
/// ```text
/// Pending ─┬─► Included ─┬─► Executed
///          │             └─► ErrorAfterIncluded
///          ├─► Error
///          └─► RejectedByUser
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Included,
    Executed,
    Error,
    ErrorAfterIncluded,
    RejectedByUser,
}

impl TxStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending | TxStatus::Included)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "Pending",
            TxStatus::Included => "Included",
            TxStatus::Executed => "Executed",
            TxStatus::Error => "Error",
            TxStatus::ErrorAfterIncluded => "ErrorAfterIncluded",
            TxStatus::RejectedByUser => "RejectedByUser",
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submission attempt, keyed by a client-generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRecord {
    pub tx_id: String,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Hash of every transaction the wallet executed, in outcome order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hashes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_tx_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_value: Option<Value>,
    #[serde(default)]
    pub final_state: bool,
    pub update_timestamp: u64,
}

impl TxRecord {
    fn new(tx_id: String, now_ms: u64) -> Self {
        Self {
            tx_id,
            status: TxStatus::Pending,
            tx: None,
            tx_hash: None,
            tx_hashes: None,
            signature: None,
            signed_tx_base64: None,
            result: None,
            error: None,
            success_value: None,
            final_state: false,
            update_timestamp: now_ms,
        }
    }

    /// Start a record for `update` if none exists yet.
    pub(crate) fn create(update: &TxUpdate, now_ms: u64) -> Self {
        Self::new(update.tx_id.clone(), now_ms)
    }

    /// Field-wise merge; fields absent from the patch are kept.
    pub(crate) fn merge(&mut self, update: TxUpdate, now_ms: u64) {
        if let Some(status) = update.status {
            self.status = status;
        }
        merge_field(&mut self.tx, update.tx);
        merge_field(&mut self.tx_hash, update.tx_hash);
        merge_field(&mut self.tx_hashes, update.tx_hashes);
        merge_field(&mut self.signature, update.signature);
        merge_field(&mut self.signed_tx_base64, update.signed_tx_base64);
        merge_field(&mut self.result, update.result);
        merge_field(&mut self.error, update.error);
        merge_field(&mut self.success_value, update.success_value);

        if let Some(final_state) = update.final_state {
            self.final_state = final_state;
        }
        if self.status.is_terminal() {
            self.final_state = true;
        }
        self.update_timestamp = now_ms.max(self.update_timestamp);
    }
}

fn merge_field<T>(slot: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *slot = patch;
    }
}

/// Partial record applied by `TxLedger::update_tx`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxUpdate {
    pub tx_id: String,
    pub status: Option<TxStatus>,
    pub tx: Option<Value>,
    pub tx_hash: Option<String>,
    pub tx_hashes: Option<Vec<String>>,
    pub signature: Option<String>,
    pub signed_tx_base64: Option<String>,
    pub result: Option<Value>,
    pub error: Option<Value>,
    pub success_value: Option<Value>,
    pub final_state: Option<bool>,
}

impl TxUpdate {
    pub fn new(tx_id: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: TxStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tx(mut self, tx: Value) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn tx_hash(mut self, hash: impl Into<String>) -> Self {
        self.tx_hash = Some(hash.into());
        self
    }

    pub fn tx_hashes(mut self, hashes: Vec<String>) -> Self {
        self.tx_hashes = Some(hashes);
        self
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn signed_tx_base64(mut self, encoded: impl Into<String>) -> Self {
        self.signed_tx_base64 = Some(encoded.into());
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    pub fn success_value(mut self, value: Value) -> Self {
        self.success_value = Some(value);
        self
    }

    pub fn final_state(mut self, final_state: bool) -> Self {
        self.final_state = Some(final_state);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Included.is_terminal());
        for status in [
            TxStatus::Executed,
            TxStatus::Error,
            TxStatus::ErrorAfterIncluded,
            TxStatus::RejectedByUser,
        ] {
            assert!(status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_merge_keeps_prior_fields() {
        let mut record = TxRecord::new("tx-1".into(), 10);
        record.merge(TxUpdate::new("tx-1").tx(json!({"receiverId": "app.near"})), 11);
        record.merge(TxUpdate::new("tx-1").tx_hash("abc"), 12);

        assert_eq!(record.tx, Some(json!({"receiverId": "app.near"})));
        assert_eq!(record.tx_hash.as_deref(), Some("abc"));
        assert_eq!(record.update_timestamp, 12);
        assert!(!record.final_state);
    }

    #[test]
    fn test_terminal_status_closes_record() {
        let mut record = TxRecord::new("tx-1".into(), 10);
        record.merge(
            TxUpdate::new("tx-1").status(TxStatus::Error).final_state(false),
            11,
        );
        assert!(record.final_state);
    }

    #[test]
    fn test_wire_names() {
        let record = TxRecord::new("tx-1".into(), 5);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["txId"], "tx-1");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["finalState"], false);
        assert!(json.get("txHash").is_none());
        assert_eq!(
            serde_json::to_value(TxStatus::ErrorAfterIncluded).unwrap(),
            "ErrorAfterIncluded"
        );
    }
}
