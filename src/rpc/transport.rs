//! JSON-RPC transports.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::config::NetworkConfig;
use crate::rpc::types::{RpcError, RpcResult};

/// Request/response channel to a node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Call `method`; returns the `result` member or the node's `error` payload.
    async fn call(&self, method: &str, params: Value) -> RpcResult<Value>;

    /// Whether any endpoint is available to call.
    fn is_configured(&self) -> bool {
        true
    }
}

/// HTTP JSON-RPC transport with ordered failover.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout_duration: Duration,
}

impl HttpTransport {
    pub fn new(endpoints: Vec<String>, timeout_duration: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
            timeout_duration,
        }
    }

    /// Transport for a network's primary and failover endpoints.
    pub fn from_network(network: &NetworkConfig) -> Self {
        Self::new(
            network.endpoints(),
            Duration::from_secs(network.rpc_timeout_secs),
        )
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, reqwest::Error> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    fn is_configured(&self) -> bool {
        !self.endpoints.is_empty()
    }

    async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        if self.endpoints.is_empty() {
            return Err(RpcError::NotConfigured);
        }

        let request_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let body = json!({
            "jsonrpc": "2.0",
            "id": format!("client-{request_id}"),
            "method": method,
            "params": params,
        });

        let mut timed_out = false;
        for (i, url) in self.endpoints.iter().enumerate() {
            match timeout(self.timeout_duration, self.post(url, &body)).await {
                Ok(Ok(mut response)) => {
                    if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
                        return Err(RpcError::Node(error.clone()));
                    }
                    return match response.get_mut("result") {
                        Some(result) => Ok(result.take()),
                        None => Err(RpcError::InvalidResponse(
                            "response has neither result nor error".to_string(),
                        )),
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint_idx = i, method, error = %e, "RPC error, trying next endpoint");
                }
                Err(_) => {
                    timed_out = true;
                    tracing::warn!(endpoint_idx = i, method, "RPC timeout, trying next endpoint");
                }
            }
        }

        if timed_out && self.endpoints.len() == 1 {
            return Err(RpcError::Timeout(self.timeout_duration.as_secs()));
        }
        Err(RpcError::Transport("All RPC endpoints failed".to_string()))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoints", &self.endpoints)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
