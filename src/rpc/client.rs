//! Typed node client.
//!
//! # Responsibilities
//! - Shape requests for the node methods the client consumes
//! - Decode the few response fields the dispatcher depends on
//! - Record per-method call metrics

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Map, Value};

use crate::observability::metrics;
use crate::rpc::transport::RpcTransport;
use crate::rpc::types::{
    AccessKeyView, BlockHeaderView, BlockReference, RpcError, RpcResult, WaitUntil,
};

/// Node client over any [`RpcTransport`].
#[derive(Clone)]
pub struct NodeClient {
    transport: Arc<dyn RpcTransport>,
}

impl NodeClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_configured()
    }

    /// Raw call with logging and metrics.
    pub async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        tracing::debug!(method, "RPC call");
        let result = self.transport.call(method, params).await;
        metrics::record_rpc_call(method, result.is_ok());
        if let Err(e) = &result {
            tracing::debug!(method, error = %e, "RPC call failed");
        }
        result
    }

    /// Submit a signed transaction (`send_tx`).
    pub async fn send_tx(&self, signed_tx_base64: &str, wait_until: WaitUntil) -> RpcResult<Value> {
        self.call(
            "send_tx",
            json!({
                "signed_tx_base64": signed_tx_base64,
                "wait_until": wait_until,
            }),
        )
        .await
    }

    /// Poll a transaction by hash and signer (`tx`).
    pub async fn tx_status(
        &self,
        tx_hash: &str,
        sender_account_id: &str,
        wait_until: WaitUntil,
    ) -> RpcResult<Value> {
        self.call(
            "tx",
            json!({
                "tx_hash": tx_hash,
                "sender_account_id": sender_account_id,
                "wait_until": wait_until,
            }),
        )
        .await
    }

    /// Positional `tx` query.
    pub async fn query_tx(&self, tx_hash: &str, account_id: &str) -> RpcResult<Value> {
        self.call("tx", json!([tx_hash, account_id])).await
    }

    /// Fetch an access key; a `result.error` from the node becomes `RpcError::Node`.
    pub async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
        block: BlockReference,
    ) -> RpcResult<AccessKeyView> {
        let result = self
            .query(
                "view_access_key",
                [("account_id", account_id), ("public_key", public_key)],
                block,
            )
            .await?;

        if let Some(error) = result.get("error").filter(|e| !e.is_null()) {
            return Err(RpcError::Node(error.clone()));
        }
        serde_json::from_value(result)
            .map_err(|e| RpcError::InvalidResponse(format!("access key: {e}")))
    }

    pub async fn view_account(&self, account_id: &str, block: BlockReference) -> RpcResult<Value> {
        self.query("view_account", [("account_id", account_id)], block)
            .await
    }

    /// Fetch a block and extract its header hash and timestamp.
    pub async fn block(&self, block: BlockReference) -> RpcResult<BlockHeaderView> {
        let result = self.call("block", block.apply(Map::new())).await?;
        let header = result
            .get("header")
            .ok_or_else(|| RpcError::InvalidResponse("block without header".to_string()))?;

        let hash = header
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidResponse("block header without hash".to_string()))?
            .to_string();
        // The node sends timestamp_nanosec as a string; older nodes as a number.
        let timestamp_nanosec = match header.get("timestamp_nanosec").or(header.get("timestamp")) {
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Number(n)) => n.as_u64(),
            _ => None,
        }
        .ok_or_else(|| RpcError::InvalidResponse("block header without timestamp".to_string()))?;

        Ok(BlockHeaderView {
            hash,
            timestamp_nanosec,
        })
    }

    /// Call a view method and decode its JSON return value.
    pub async fn call_function(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        block: BlockReference,
    ) -> RpcResult<Value> {
        let args_base64 = if args.is_null() {
            String::new()
        } else {
            STANDARD.encode(args.to_string())
        };
        let result = self
            .query(
                "call_function",
                [
                    ("account_id", contract_id),
                    ("method_name", method_name),
                    ("args_base64", args_base64.as_str()),
                ],
                block,
            )
            .await?;

        let bytes: Vec<u8> = result
            .get("result")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| RpcError::InvalidResponse(format!("call_function result: {e}")))?
            .unwrap_or_default();
        Ok(parse_json_bytes(&bytes))
    }

    async fn query<const N: usize>(
        &self,
        request_type: &str,
        fields: [(&str, &str); N],
        block: BlockReference,
    ) -> RpcResult<Value> {
        let mut params = Map::new();
        params.insert("request_type".into(), request_type.into());
        for (key, value) in fields {
            params.insert(key.into(), value.into());
        }
        self.call("query", block.apply(params)).await
    }
}

/// Decode bytes as JSON, falling back to a string, or `null` when empty.
pub fn parse_json_bytes(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient").finish_non_exhaustive()
    }
}
