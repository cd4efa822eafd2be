//! Node protocol types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How long `send_tx`/`tx` should wait before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitUntil {
    /// Return as soon as the transaction is accepted.
    None,
    #[default]
    Included,
    ExecutedOptimistic,
    IncludedFinal,
    Executed,
    Final,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::None => "NONE",
            WaitUntil::Included => "INCLUDED",
            WaitUntil::ExecutedOptimistic => "EXECUTED_OPTIMISTIC",
            WaitUntil::IncludedFinal => "INCLUDED_FINAL",
            WaitUntil::Executed => "EXECUTED",
            WaitUntil::Final => "FINAL",
        }
    }
}

/// Which block a query reads from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BlockReference {
    Final,
    #[default]
    Optimistic,
    /// Block height or hash.
    Id(String),
}

impl BlockReference {
    /// Add the `finality` / `block_id` selector to query params.
    pub fn apply(&self, mut params: Map<String, Value>) -> Value {
        match self {
            BlockReference::Final => {
                params.insert("finality".into(), "final".into());
            }
            BlockReference::Optimistic => {
                params.insert("finality".into(), "optimistic".into());
            }
            BlockReference::Id(id) => {
                let id = id
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(id.as_str()));
                params.insert("block_id".into(), id);
            }
        }
        Value::Object(params)
    }
}

impl From<Option<&str>> for BlockReference {
    fn from(id: Option<&str>) -> Self {
        match id {
            Some("final") => BlockReference::Final,
            Some("optimistic") | None => BlockReference::Optimistic,
            Some(other) => BlockReference::Id(other.to_string()),
        }
    }
}

/// Access key as reported by `view_access_key`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccessKeyView {
    pub nonce: u64,
    #[serde(default)]
    pub permission: Value,
}

/// The parts of a block header the client caches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockHeaderView {
    pub hash: String,
    pub timestamp_nanosec: u64,
}

/// Errors that can occur talking to the node.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// No node endpoint configured for the network.
    #[error("no node endpoint configured")]
    NotConfigured,

    /// Connection or HTTP failure on every endpoint.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// Request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with an error payload.
    #[error("RPC node error: {0}")]
    Node(Value),

    /// The node answered with something unexpected.
    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Error as JSON for ledger records.
    pub fn to_value(&self) -> Value {
        match self {
            RpcError::Node(payload) => payload.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
