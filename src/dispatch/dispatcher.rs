use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::clock::SharedClock;
use crate::config::DispatchConfig;
use crate::dispatch::eligibility::{select_path, SigningPath};
use crate::error::{ClientError, ClientResult};
use crate::history::{TxLedger, TxStatus, TxUpdate};
use crate::observability::metrics;
use crate::relay::{RelayTransaction, SendTransactionsReply, SendTransactionsRequest, WalletRelay};
use crate::rpc::client::parse_json_bytes;
use crate::rpc::{BlockReference, NodeClient, RpcError, WaitUntil};
use crate::state::{CachedBlock, SessionState, StateStore};
use crate::transaction::{Action, CryptoHash, KeyPair, PlainTransaction};

/// A batch of actions for one receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTxRequest {
    pub receiver_id: String,
    pub actions: Vec<Action>,
    /// Submission wait policy; the configured default applies when unset.
    pub wait_until: Option<WaitUntil>,
}

impl SendTxRequest {
    pub fn new(receiver_id: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            actions,
            wait_until: None,
        }
    }

    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = Some(wait_until);
        self
    }
}

/// Result of a dispatch.
#[derive(Debug)]
pub struct Dispatched {
    pub tx_id: String,
    pub path: SigningPath,
    /// Node `send_tx` result (local path) or the wallet reply (relay path).
    pub response: Value,
    /// Post-inclusion execution poll, if one was started.
    pub execution: Option<JoinHandle<()>>,
}

impl Dispatched {
    /// Wait for the execution poll, if any, to record its outcome.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.execution.take() {
            if let Err(e) = handle.await {
                tracing::warn!(tx_id = %self.tx_id, error = %e, "Execution poll task failed");
            }
        }
    }
}

/// Drives one transaction from request to terminal record.
pub struct TxDispatcher {
    store: Arc<dyn StateStore>,
    ledger: Arc<TxLedger>,
    rpc: NodeClient,
    relay: Arc<WalletRelay>,
    clock: SharedClock,
    config: DispatchConfig,
    relay_timeout: Duration,
    /// Held from nonce lookup until the next nonce is reserved.
    nonce_lock: tokio::sync::Mutex<()>,
}

impl TxDispatcher {
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: Arc<TxLedger>,
        rpc: NodeClient,
        relay: Arc<WalletRelay>,
        clock: SharedClock,
        config: DispatchConfig,
        relay_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            rpc,
            relay,
            clock,
            config,
            relay_timeout,
            nonce_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Sign and submit `request`, locally when the session key allows it,
    /// otherwise through the wallet.
    pub async fn send_tx(&self, request: SendTxRequest) -> ClientResult<Dispatched> {
        let session = self
            .store
            .get_state()
            .await
            .filter(SessionState::is_signed_in)
            .ok_or(ClientError::Unauthenticated)?;
        let signer_id = session
            .account_id
            .clone()
            .ok_or(ClientError::Unauthenticated)?;

        let path = select_path(&session, &request.receiver_id, &request.actions);
        metrics::record_dispatch_path(path.as_str());
        let tx_id = generate_tx_id(self.clock.now_ms());
        tracing::info!(
            tx_id = %tx_id,
            receiver_id = %request.receiver_id,
            actions = request.actions.len(),
            path = path.as_str(),
            "Dispatching transaction"
        );

        match path {
            SigningPath::Local => self.sign_locally(tx_id, signer_id, &session, request).await,
            SigningPath::Relay => self.delegate(tx_id, signer_id, request).await,
        }
    }

    async fn sign_locally(
        &self,
        tx_id: String,
        signer_id: String,
        session: &SessionState,
        request: SendTxRequest,
    ) -> ClientResult<Dispatched> {
        if !self.rpc.is_configured() {
            return Err(RpcError::NotConfigured.into());
        }
        let key = session
            .signing_key()
            .ok_or_else(|| ClientError::AccessKey("session key is unusable".to_string()))?;
        let public_key = key.public_key().to_string();

        self.ledger.update_tx(
            TxUpdate::new(&tx_id)
                .status(TxStatus::Pending)
                .tx(unsigned_tx(&signer_id, &request.receiver_id, &request.actions))
                .final_state(false),
        );

        let nonce = self.reserve_nonce(&tx_id, &signer_id, &public_key).await?;
        let block = self.recent_block(&tx_id).await?;

        let built = build_signed(
            &key,
            signer_id,
            request.receiver_id,
            nonce,
            &block,
            request.actions,
        );
        let (plain, signed) = match built {
            Ok(built) => built,
            Err(e) => {
                self.fail(&tx_id, json!(e.to_string()));
                return Err(e);
            }
        };

        let tx_hash = signed.hash.to_string();
        let signed_b64 = signed.to_base64()?;
        self.ledger.update_tx(
            TxUpdate::new(&tx_id)
                .status(TxStatus::Pending)
                .tx(serde_json::to_value(&plain).unwrap_or(Value::Null))
                .signature(signed.signature_base58())
                .signed_tx_base64(&signed_b64)
                .tx_hash(&tx_hash)
                .final_state(false),
        );

        let wait_until = request.wait_until.unwrap_or(self.config.default_wait_until);
        match self.rpc.send_tx(&signed_b64, wait_until).await {
            Ok(response) => {
                self.ledger.update_tx(
                    TxUpdate::new(&tx_id)
                        .status(TxStatus::Included)
                        .final_state(false),
                );
                let execution = self
                    .config
                    .poll_execution
                    .then(|| self.spawn_execution_poll(&tx_id, tx_hash, plain.signer_id));
                Ok(Dispatched {
                    tx_id,
                    path: SigningPath::Local,
                    response,
                    execution,
                })
            }
            Err(e) => {
                tracing::warn!(tx_id = %tx_id, error = %e, "Transaction submission rejected");
                self.fail(&tx_id, e.to_value());
                Err(e.into())
            }
        }
    }

    /// Next nonce for `public_key`, written back to the cache before returning.
    ///
    /// Concurrent dispatches queue on `nonce_lock`, so each one reserves a
    /// distinct nonce. A reserved nonce stays consumed even if signing or
    /// submission fails later.
    async fn reserve_nonce(
        &self,
        tx_id: &str,
        signer_id: &str,
        public_key: &str,
    ) -> ClientResult<u64> {
        let _reserving = self.nonce_lock.lock().await;
        let cache = self.store.chain_cache();

        let current = match cache.nonce(public_key) {
            Some(nonce) => nonce,
            None => {
                let access_key = self
                    .rpc
                    .view_access_key(signer_id, public_key, BlockReference::Optimistic)
                    .await
                    .map_err(|e| {
                        self.fail(tx_id, e.to_value());
                        ClientError::AccessKey(format!(
                            "{e} when fetching nonce for {signer_id} with key {public_key}"
                        ))
                    })?;
                access_key.nonce
            }
        };

        let next = current + 1;
        cache.set_nonce(public_key, next);
        tracing::debug!(tx_id = %tx_id, nonce = next, "Reserved nonce");
        Ok(next)
    }

    /// Cached block if still fresh, else the latest final block.
    async fn recent_block(&self, tx_id: &str) -> ClientResult<CachedBlock> {
        let cache = self.store.chain_cache();
        let window_ms = self.config.block_freshness_secs.saturating_mul(1_000);
        let now = self.clock.now_ms();

        if let Some(block) = cache.block().filter(|b| b.is_fresh(now, window_ms)) {
            return Ok(block);
        }

        let header = self.rpc.block(BlockReference::Final).await.map_err(|e| {
            self.fail(tx_id, e.to_value());
            ClientError::from(e)
        })?;
        let block = CachedBlock {
            hash: header.hash,
            timestamp_nanosec: header.timestamp_nanosec,
        };
        cache.set_block(&block);
        Ok(block)
    }

    fn spawn_execution_poll(&self, tx_id: &str, tx_hash: String, signer_id: String) -> JoinHandle<()> {
        let rpc = self.rpc.clone();
        let ledger = self.ledger.clone();
        let tx_id = tx_id.to_string();

        tokio::spawn(async move {
            let update = match rpc
                .tx_status(&tx_hash, &signer_id, WaitUntil::ExecutedOptimistic)
                .await
            {
                Ok(result) => classify_execution(&tx_id, result),
                Err(e) => TxUpdate::new(&tx_id)
                    .status(TxStatus::ErrorAfterIncluded)
                    .error(e.to_value()),
            };
            ledger.update_tx(update.final_state(true));
        })
    }

    async fn delegate(
        &self,
        tx_id: String,
        signer_id: String,
        request: SendTxRequest,
    ) -> ClientResult<Dispatched> {
        let transaction = RelayTransaction {
            signer_id,
            receiver_id: request.receiver_id,
            actions: request.actions,
        };
        self.ledger.update_tx(
            TxUpdate::new(&tx_id)
                .status(TxStatus::Pending)
                .tx(serde_json::to_value(&transaction).unwrap_or(Value::Null))
                .final_state(false),
        );

        let relay_request = SendTransactionsRequest {
            transactions: vec![transaction],
        };
        let call = self.relay.send_transactions(&relay_request);
        let reply = match tokio::time::timeout(self.relay_timeout, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::warn!(tx_id = %tx_id, error = %e, "Wallet relay failed");
                self.fail(&tx_id, json!(e.to_string()));
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(tx_id = %tx_id, timeout = ?self.relay_timeout, "Wallet did not respond");
                self.fail(&tx_id, json!("wallet did not respond in time"));
                return Err(ClientError::RelayTimeout(self.relay_timeout));
            }
        };

        self.ledger.update_tx(classify_relay_reply(&tx_id, &reply));
        Ok(Dispatched {
            tx_id,
            path: SigningPath::Relay,
            response: serde_json::to_value(&reply).unwrap_or(Value::Null),
            execution: None,
        })
    }

    fn fail(&self, tx_id: &str, error: Value) {
        self.ledger.update_tx(
            TxUpdate::new(tx_id)
                .status(TxStatus::Error)
                .error(error)
                .final_state(true),
        );
    }
}

impl std::fmt::Debug for TxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxDispatcher")
            .field("network_id", &self.store.network_id())
            .field("config", &self.config)
            .finish()
    }
}

fn build_signed(
    key: &KeyPair,
    signer_id: String,
    receiver_id: String,
    nonce: u64,
    block: &CachedBlock,
    actions: Vec<Action>,
) -> ClientResult<(PlainTransaction, crate::transaction::SignedTransaction)> {
    let plain = PlainTransaction {
        signer_id,
        public_key: key.public_key(),
        nonce,
        receiver_id,
        block_hash: CryptoHash::from_str(&block.hash)?,
        actions,
    };
    let signed = plain.clone().sign(key)?;
    Ok((plain, signed))
}

fn unsigned_tx(signer_id: &str, receiver_id: &str, actions: &[Action]) -> Value {
    json!({
        "signerId": signer_id,
        "receiverId": receiver_id,
        "actions": actions,
    })
}

/// Turn a `tx` poll result into the record's terminal update.
fn classify_execution(tx_id: &str, result: Value) -> TxUpdate {
    if let Some(failure) = result.pointer("/status/Failure").cloned() {
        return TxUpdate::new(tx_id)
            .status(TxStatus::ErrorAfterIncluded)
            .error(failure)
            .result(result);
    }

    let success_value = result
        .pointer("/status/SuccessValue")
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(decode_success_value);

    let mut update = TxUpdate::new(tx_id).status(TxStatus::Executed).result(result);
    if let Some(value) = success_value {
        update = update.success_value(value);
    }
    update
}

fn decode_success_value(encoded: &str) -> Value {
    match STANDARD.decode(encoded) {
        Ok(bytes) => parse_json_bytes(&bytes),
        Err(_) => Value::String(encoded.to_string()),
    }
}

/// Map a wallet reply onto the record's terminal update.
fn classify_relay_reply(tx_id: &str, reply: &SendTransactionsReply) -> TxUpdate {
    let update = TxUpdate::new(tx_id).final_state(true);

    if let Some(outcomes) = reply.outcomes.as_ref().filter(|o| !o.is_empty()) {
        let tx_hashes: Vec<String> = outcomes
            .iter()
            .filter_map(|o| o.pointer("/transaction/hash").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let result = match outcomes.as_slice() {
            [single] => single.clone(),
            many => Value::Array(many.to_vec()),
        };
        let mut update = update.status(TxStatus::Executed).result(result);
        if let Some(last) = tx_hashes.last().cloned() {
            update = update.tx_hash(last).tx_hashes(tx_hashes);
        }
        return update;
    }

    if reply.rejected == Some(true) {
        return update.status(TxStatus::RejectedByUser);
    }

    let error = match &reply.error {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or_else(|_| json!(raw)),
        Some(other) => other.clone(),
        None => json!("wallet returned no outcome"),
    };
    update.status(TxStatus::Error).error(error)
}

/// Locally unique transaction id: `tx-<millis>-<base36 random>`.
pub fn generate_tx_id(now_ms: u64) -> String {
    format!("tx-{now_ms}-{}", to_base36(fastrand::u64(..)))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
