//! Shared fixtures for integration tests: scripted node, scripted wallet.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use url::Url;

use near_relay_client::client::SignInParams;
use near_relay_client::clock::ManualClock;
use near_relay_client::config::{ClientConfig, StorageMode};
use near_relay_client::relay::{
    Inbox, InboundMessage, RelayEnvelope, RelayError, SurfaceHandle, WalletSurface, MESSAGE_TYPE,
};
use near_relay_client::rpc::{RpcError, RpcResult, RpcTransport};
use near_relay_client::{NearClient, StateMode};

/// Wall-clock start used by every fixture.
pub const NOW_MS: u64 = 1_700_000_000_000;
/// Nonce the mock node reports for any access key.
pub const NODE_NONCE: u64 = 41;
pub const WALLET_ORIGIN: &str = "https://wallet.test";

/// Base58 block hash the mock node serves.
pub fn block_hash() -> String {
    bs58::encode([7u8; 32]).into_string()
}

/// Scripted JSON-RPC node. Calls are counted per method; `query` calls are
/// keyed as `query:<request_type>`. Every call yields once so concurrent
/// callers interleave the way they would against a real node.
pub struct MockTransport {
    calls: Mutex<Vec<(String, Value)>>,
    overrides: Mutex<HashMap<String, RpcResult<Value>>>,
    block_timestamp_ms: AtomicU64,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            overrides: Mutex::new(HashMap::new()),
            block_timestamp_ms: AtomicU64::new(NOW_MS),
        })
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_params(&self, key: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p.clone())
    }

    /// Replace the response for `key`.
    pub fn respond(&self, key: &str, response: RpcResult<Value>) {
        self.overrides
            .lock()
            .unwrap()
            .insert(key.to_string(), response);
    }

    /// Timestamp of the block the node reports as latest final.
    pub fn set_block_time_ms(&self, ms: u64) {
        self.block_timestamp_ms.store(ms, Ordering::SeqCst);
    }

    fn default_response(&self, key: &str, params: &Value) -> RpcResult<Value> {
        match key {
            "query:view_access_key" => Ok(json!({
                "nonce": NODE_NONCE,
                "permission": {"FunctionCall": {"receiver_id": "app.near", "method_names": []}},
                "block_height": 100,
            })),
            "block" => Ok(json!({
                "header": {
                    "hash": block_hash(),
                    "height": 100,
                    "timestamp_nanosec": (self.block_timestamp_ms.load(Ordering::SeqCst) * 1_000_000).to_string(),
                }
            })),
            "send_tx" => Ok(json!({"final_execution_status": "INCLUDED"})),
            "tx" => Ok(json!({
                "status": {"SuccessValue": STANDARD.encode(br#""done""#)},
                "transaction": {"hash": params["tx_hash"].clone()},
            })),
            "query:call_function" => Ok(json!({
                "result": br#"{"greeting":"hi"}"#.to_vec(),
                "logs": [],
            })),
            "query:view_account" => Ok(json!({"amount": "1000", "code_hash": "11111111111111111111111111111111"})),
            other => Err(RpcError::Node(json!({"name": "UNKNOWN_METHOD", "method": other}))),
        }
    }
}

fn call_key(method: &str, params: &Value) -> String {
    match (method, params.get("request_type").and_then(Value::as_str)) {
        ("query", Some(kind)) => format!("query:{kind}"),
        _ => method.to_string(),
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, method: &str, params: Value) -> RpcResult<Value> {
        tokio::task::yield_now().await;
        let key = call_key(method, &params);
        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), params.clone()));
        if let Some(response) = self.overrides.lock().unwrap().get(&key) {
            return response.clone();
        }
        self.default_response(&key, &params)
    }
}

/// Decides the wallet's reply payload for an envelope; `None` stays silent.
pub type Responder = Arc<dyn Fn(&RelayEnvelope) -> Option<Value> + Send + Sync>;

#[derive(Default)]
struct SurfaceLog {
    opened: Mutex<Vec<String>>,
    posted: Mutex<Vec<RelayEnvelope>>,
    inbox: Mutex<Option<Inbox>>,
    closed: Mutex<usize>,
    responder: Mutex<Option<Responder>>,
}

/// Scripted wallet surface.
#[derive(Clone, Default)]
pub struct MockSurface {
    log: Arc<SurfaceLog>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replying<F>(responder: F) -> Self
    where
        F: Fn(&RelayEnvelope) -> Option<Value> + Send + Sync + 'static,
    {
        let surface = Self::default();
        surface.set_responder(responder);
        surface
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&RelayEnvelope) -> Option<Value> + Send + Sync + 'static,
    {
        *self.log.responder.lock().unwrap() = Some(Arc::new(responder));
    }

    pub fn posted(&self) -> Vec<RelayEnvelope> {
        self.log.posted.lock().unwrap().clone()
    }

    pub fn posted_count(&self, method: &str) -> usize {
        self.posted().iter().filter(|e| e.method == method).count()
    }

    pub fn opened(&self) -> Vec<String> {
        self.log.opened.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        *self.log.closed.lock().unwrap()
    }

    /// Push a raw message into the relay from `origin`.
    pub fn send_from(&self, origin: &str, data: Value) {
        let inbox = self.log.inbox.lock().unwrap().clone();
        if let Some(inbox) = inbox {
            let _ = inbox.send(InboundMessage {
                origin: origin.to_string(),
                data,
            });
        }
    }

    /// Reply to the most recent request from the wallet origin.
    pub fn reply_to_last(&self, payload: Value) {
        let id = self
            .posted()
            .last()
            .and_then(|e| e.id().map(str::to_string))
            .expect("no request posted");
        self.send_from(
            WALLET_ORIGIN,
            json!({"id": id, "type": MESSAGE_TYPE, "payload": payload}),
        );
    }

    /// Wait until `count` envelopes were posted; returns the latest.
    pub async fn wait_for_posts(&self, count: usize) -> RelayEnvelope {
        for _ in 0..400 {
            {
                let posted = self.log.posted.lock().unwrap();
                if posted.len() >= count {
                    return posted[count - 1].clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} posted envelopes");
    }
}

struct MockHandle {
    log: Arc<SurfaceLog>,
    inbox: Inbox,
}

#[async_trait]
impl WalletSurface for MockSurface {
    async fn open(&self, url: Url, inbox: Inbox) -> Result<Box<dyn SurfaceHandle>, RelayError> {
        self.log.opened.lock().unwrap().push(url.to_string());
        *self.log.inbox.lock().unwrap() = Some(inbox.clone());
        Ok(Box::new(MockHandle {
            log: self.log.clone(),
            inbox,
        }))
    }
}

impl SurfaceHandle for MockHandle {
    fn post(&self, envelope: &RelayEnvelope) -> Result<(), RelayError> {
        self.log.posted.lock().unwrap().push(envelope.clone());
        let responder = self.log.responder.lock().unwrap().clone();
        if let Some(payload) = responder.and_then(|r| r(envelope)) {
            let _ = self.inbox.send(InboundMessage {
                origin: WALLET_ORIGIN.to_string(),
                data: json!({"id": envelope.id(), "type": MESSAGE_TYPE, "payload": payload}),
            });
        }
        Ok(())
    }

    fn close(&self) {
        *self.log.closed.lock().unwrap() += 1;
    }
}

/// Wallet that signs alice.near in and answers `sendTransactions` with `send_reply`.
pub fn alice_wallet(send_reply: Option<Value>) -> MockSurface {
    MockSurface::replying(move |envelope| match envelope.method.as_str() {
        "signIn" => Some(json!({"accountId": "alice.near"})),
        "sendTransactions" => send_reply.clone(),
        _ => None,
    })
}

/// In-memory configuration pointed at the mock wallet.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.storage.mode = StorageMode::Memory;
    config.relay.widget_url = WALLET_ORIGIN.to_string();
    config.relay.target_origin = WALLET_ORIGIN.to_string();
    config.relay.timeout_secs = 5;
    config
}

pub struct Harness {
    pub client: NearClient,
    pub transport: Arc<MockTransport>,
    pub surface: MockSurface,
    pub clock: ManualClock,
}

/// Isolated client with mocks wired in; not signed in.
pub async fn harness(config: ClientConfig, surface: MockSurface) -> Harness {
    harness_with_mode(config, surface, StateMode::Isolated).await
}

pub async fn harness_with_mode(
    config: ClientConfig,
    surface: MockSurface,
    mode: StateMode,
) -> Harness {
    let transport = MockTransport::new();
    let clock = ManualClock::new(NOW_MS);
    let client = NearClient::builder(config)
        .state_mode(mode)
        .transport(transport.clone())
        .surface(Arc::new(surface.clone()))
        .clock(Arc::new(clock.clone()))
        .build()
        .await
        .expect("client builds");
    Harness {
        client,
        transport,
        surface,
        clock,
    }
}

/// Harness signed in as alice.near with a key scoped to app.near.
pub async fn alice(send_reply: Option<Value>) -> Harness {
    let h = harness(test_config(), alice_wallet(send_reply)).await;
    h.client
        .request_sign_in(SignInParams::for_contract("app.near"))
        .await
        .expect("sign-in succeeds");
    h
}
