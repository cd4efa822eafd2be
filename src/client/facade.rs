use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::client::session::{NetworkSession, SessionDeps, StateMode, TransportFactory};
use crate::client::types::{
    AuthStatus, Selection, SignInOutcome, SignInParams, SignMessageParams, SignedMessage,
};
use crate::clock::{SharedClock, SystemClock};
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ClientConfig, NetworkConfig, StorageMode};
use crate::dispatch::{Dispatched, SendTxRequest};
use crate::error::{ClientError, ClientResult};
use crate::events::{Subscribers, Subscription};
use crate::history::{TxHistory, TxRecord};
use crate::relay::{
    SignInRequest, SignMessageRequest, StateUpdateCallback, WalletAccount, WalletRelay,
    WalletSurface, WebSocketSurface,
};
use crate::rpc::{AccessKeyView, BlockHeaderView, BlockReference, HttpTransport, RpcTransport};
use crate::state::SessionState;
use crate::storage::LAST_ACCOUNT_KEY;

/// Configures and builds a [`NearClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    mode: Option<StateMode>,
    transports: Option<TransportFactory>,
    surface: Option<Arc<dyn WalletSurface>>,
    clock: Option<SharedClock>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            mode: None,
            transports: None,
            surface: None,
            clock: None,
        }
    }

    /// Override the state mode implied by `config.storage`.
    pub fn state_mode(mut self, mode: StateMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Use the same transport for every network.
    pub fn transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transports = Some(Arc::new(move |_: &NetworkConfig| transport.clone()));
        self
    }

    /// Build a transport per network.
    pub fn transport_factory(mut self, factory: TransportFactory) -> Self {
        self.transports = Some(factory);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn WalletSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and open the session for the configured
    /// network. Must run inside a Tokio runtime.
    pub async fn build(self) -> ClientResult<NearClient> {
        if let Err(errors) = validate_config(&self.config) {
            // A network without a node endpoint may exist; RPC then fails with `Config`.
            let fatal: Vec<String> = errors
                .iter()
                .filter(|e| !matches!(e, ValidationError::MissingNodeUrl(_)))
                .map(ToString::to_string)
                .collect();
            if !fatal.is_empty() {
                return Err(ClientError::Config(fatal.join("; ")));
            }
        }

        let mode = self.mode.unwrap_or_else(|| match self.config.storage.mode {
            StorageMode::Durable => StateMode::Durable {
                dir: PathBuf::from(&self.config.storage.dir),
            },
            StorageMode::Memory => StateMode::Isolated,
        });
        let transports = self.transports.unwrap_or_else(|| {
            Arc::new(|network: &NetworkConfig| {
                Arc::new(HttpTransport::from_network(network)) as Arc<dyn RpcTransport>
            })
        });
        let surface = self
            .surface
            .unwrap_or_else(|| Arc::new(WebSocketSurface::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let back: Arc<OnceLock<Weak<ClientInner>>> = Arc::new(OnceLock::new());
        let relay = Arc::new(WalletRelay::new(
            &self.config.relay,
            surface,
            Some(wallet_state_callback(back.clone())),
        )?);
        let relay_timeout = Duration::from_secs(self.config.relay.timeout_secs);

        let session = NetworkSession::open(
            self.config.network.clone(),
            SessionDeps {
                mode: &mode,
                dispatch: &self.config.dispatch,
                relay: relay.clone(),
                relay_timeout,
                clock: clock.clone(),
                transports: &transports,
            },
        )
        .await?;

        let accounts = Arc::new(Subscribers::new("account"));
        let txs = Arc::new(Subscribers::new("tx"));
        session.attach(accounts.clone(), txs.clone()).await;
        if let Some(state) = session.store.get_state().await {
            relay.set_state(relay_view(&state));
        }

        tracing::info!(
            network_id = %self.config.network.network_id,
            mode = ?mode,
            "Client ready"
        );

        let inner = Arc::new(ClientInner {
            config: ArcSwap::from_pointee(self.config),
            mode,
            clock,
            transports,
            relay,
            relay_timeout,
            session: ArcSwap::from_pointee(session),
            accounts,
            txs,
            switch_lock: tokio::sync::Mutex::new(()),
        });
        let _ = back.set(Arc::downgrade(&inner));

        Ok(NearClient { inner })
    }
}

struct ClientInner {
    config: ArcSwap<ClientConfig>,
    mode: StateMode,
    clock: SharedClock,
    transports: TransportFactory,
    relay: Arc<WalletRelay>,
    relay_timeout: Duration,
    session: ArcSwap<NetworkSession>,
    accounts: Arc<Subscribers<Option<String>>>,
    txs: Arc<Subscribers<TxRecord>>,
    switch_lock: tokio::sync::Mutex<()>,
}

impl ClientInner {
    /// Write a wallet-pushed account change into the store.
    async fn apply_wallet_state(&self, state: Value) {
        let session = self.session.load_full();
        let account_id = string_field(&state, "accountId");
        let current = session.store.get_state().await;
        if account_id == current.as_ref().and_then(|s| s.account_id.clone()) {
            return;
        }

        let next = SessionState {
            account_id,
            public_key: None,
            private_key: string_field(&state, "privateKey"),
            network_id: session.network.network_id.clone(),
            last_wallet_id: string_field(&state, "lastWalletId"),
            access_key_contract_id: current.and_then(|s| s.access_key_contract_id),
        };
        if let Err(e) = session.store.set_state(next).await {
            tracing::error!(error = %e, "Failed to apply wallet state update");
        }
    }
}

fn wallet_state_callback(back: Arc<OnceLock<Weak<ClientInner>>>) -> StateUpdateCallback {
    Arc::new(move |state: Value| -> BoxFuture<'static, ()> {
        let inner = back.get().and_then(Weak::upgrade);
        Box::pin(async move {
            if let Some(inner) = inner {
                inner.apply_wallet_state(state).await;
            }
        })
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Session as shown to the wallet: everything but the secret key.
fn relay_view(state: &SessionState) -> Value {
    let mut value = serde_json::to_value(state).unwrap_or(Value::Null);
    if let Some(map) = value.as_object_mut() {
        map.remove("privateKey");
    }
    value
}

/// Handle to one client: session store, history ledger and wallet relay.
///
/// Clones share everything. Separately built clients share nothing unless
/// they use the same durable directory.
#[derive(Clone)]
pub struct NearClient {
    inner: Arc<ClientInner>,
}

impl NearClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Client with default transport, surface and clock.
    pub async fn from_config(config: ClientConfig) -> ClientResult<Self> {
        ClientBuilder::new(config).build().await
    }

    pub fn config(&self) -> ClientConfig {
        self.inner.config.load().as_ref().clone()
    }

    pub fn network_id(&self) -> String {
        self.inner.session.load().network.network_id.clone()
    }

    pub async fn state(&self) -> Option<SessionState> {
        self.inner.session.load_full().store.get_state().await
    }

    pub async fn account_id(&self) -> Option<String> {
        self.inner.session.load_full().account_id().await
    }

    pub async fn public_key(&self) -> Option<String> {
        self.state().await.and_then(|s| s.public_key)
    }

    pub async fn auth_status(&self) -> AuthStatus {
        match self.account_id().await {
            Some(_) => AuthStatus::SignedIn,
            None => AuthStatus::SignedOut,
        }
    }

    pub async fn selected(&self) -> Selection {
        let session = self.inner.session.load_full();
        let state = session.store.get_state().await;
        let network = &session.network;
        Selection {
            network: network.network_id.clone(),
            node_url: network.resolved_node_url(),
            wallet_url: network.wallet_url.clone(),
            helper_url: network.helper_url.clone(),
            explorer_url: network.explorer_url.clone(),
            account: state.as_ref().and_then(|s| s.account_id.clone()),
            contract: state.as_ref().and_then(|s| s.access_key_contract_id.clone()),
            public_key: state.and_then(|s| s.public_key),
        }
    }

    /// Switch to another network.
    ///
    /// In-flight wallet requests fail with `Cancelled`. Durable clients open the
    /// target network's own session; other modes start signed out. History and
    /// the cached block are cleared either way.
    pub async fn switch_network(&self, network_id: &str) -> ClientResult<()> {
        let _guard = self.inner.switch_lock.lock().await;
        let old = self.inner.session.load_full();
        if old.network.network_id == network_id {
            return Ok(());
        }

        let mut network = NetworkConfig::for_network(network_id);
        network.rpc_timeout_secs = old.network.rpc_timeout_secs;

        let config = self.inner.config.load_full();
        let session = NetworkSession::open(
            network.clone(),
            SessionDeps {
                mode: &self.inner.mode,
                dispatch: &config.dispatch,
                relay: self.inner.relay.clone(),
                relay_timeout: self.inner.relay_timeout,
                clock: self.inner.clock.clone(),
                transports: &self.inner.transports,
            },
        )
        .await?;

        self.inner.relay.reject_pending();
        if matches!(self.inner.mode, StateMode::External(_)) {
            session.store.clear_state().await?;
        }
        session.store.chain_cache().clear_block();
        session.ledger.clear_history();

        let previous_account = old.account_id().await;
        old.detach();
        session
            .attach(self.inner.accounts.clone(), self.inner.txs.clone())
            .await;

        let state = session.store.get_state().await;
        self.inner
            .relay
            .set_state(state.as_ref().map(relay_view).unwrap_or(Value::Null));
        let account = state.and_then(|s| s.account_id);

        let mut next_config = config.as_ref().clone();
        next_config.network = network;
        self.inner.config.store(Arc::new(next_config));
        self.inner.session.store(Arc::new(session));

        tracing::info!(from = %old.network.network_id, to = %network_id, "Switched network");
        if account != previous_account {
            self.inner.accounts.notify(&account);
        }
        Ok(())
    }

    /// Sign in through the wallet with a freshly generated key.
    ///
    /// The key is committed to the session only once the wallet returns an
    /// account.
    pub async fn request_sign_in(&self, params: SignInParams) -> ClientResult<SignInOutcome> {
        let session = self.inner.session.load_full();
        let network_id = session.network.network_id.clone();

        let previous = session
            .meta
            .load(LAST_ACCOUNT_KEY)?
            .and_then(|v| v.as_str().map(str::to_string));
        let current = session.account_id().await;
        let is_reconnection = previous.is_some() && previous != current;

        let staged = crate::transaction::KeyPair::generate();
        let request = SignInRequest {
            network_id: network_id.clone(),
            contract_id: params.contract_id.clone(),
            method_names: params.method_names.clone(),
            public_key: Some(staged.public_key().to_string()),
        };
        let reply = tokio::time::timeout(self.inner.relay_timeout, self.inner.relay.sign_in(&request))
            .await
            .map_err(|_| ClientError::RelayTimeout(self.inner.relay_timeout))??;

        if let Some(error) = reply.error.filter(|e| !e.is_null()) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            tracing::warn!(network_id = %network_id, error = %message, "Wallet reported sign-in error");
            return Err(ClientError::Wallet(message));
        }

        let Some(account_id) = reply.account_id else {
            tracing::warn!(network_id = %network_id, "Sign-in finished without an account");
            session.store.clear_state().await?;
            return Err(ClientError::Wallet(
                "sign-in completed but no account information was returned".to_string(),
            ));
        };

        session
            .meta
            .save(LAST_ACCOUNT_KEY, &Value::String(account_id.clone()))?;

        let committed = SessionState {
            account_id: Some(account_id.clone()),
            public_key: None,
            private_key: Some(reply.private_key.unwrap_or_else(|| staged.secret())),
            network_id: network_id.clone(),
            last_wallet_id: None,
            access_key_contract_id: params.contract_id.clone(),
        };
        session.store.set_state(committed).await?;

        let state = session.store.get_state().await;
        if let Some(state) = &state {
            self.inner.relay.set_state(relay_view(state));
        }
        let public_key = reply
            .public_key
            .or_else(|| state.and_then(|s| s.public_key));
        let accounts = reply.accounts.unwrap_or_else(|| {
            vec![WalletAccount {
                account_id: account_id.clone(),
                public_key: public_key.clone(),
                active: None,
            }]
        });

        tracing::info!(network_id = %network_id, account_id = %account_id, is_reconnection, "Signed in");
        Ok(SignInOutcome {
            account_id,
            public_key,
            network_id,
            contract_id: params.contract_id,
            method_names: params.method_names,
            accounts,
            is_reconnection,
        })
    }

    pub async fn sign_out(&self) -> ClientResult<()> {
        let session = self.inner.session.load_full();
        session.store.clear_state().await?;
        self.inner.relay.set_state(Value::Null);
        tracing::info!(network_id = %session.network.network_id, "Signed out");
        Ok(())
    }

    /// Sign and submit a transaction. See [`crate::dispatch::TxDispatcher`].
    pub async fn send_tx(&self, request: SendTxRequest) -> ClientResult<Dispatched> {
        self.inner.session.load_full().dispatcher.send_tx(request).await
    }

    /// Ask the wallet to sign an off-chain message.
    pub async fn sign_message(&self, params: SignMessageParams) -> ClientResult<SignedMessage> {
        self.account_id().await.ok_or(ClientError::Unauthenticated)?;

        let nonce = params.nonce.unwrap_or_else(rand::random::<[u8; 32]>);
        let request = SignMessageRequest {
            message: params.message,
            recipient: params.recipient,
            nonce: nonce.to_vec(),
            callback_url: params.callback_url,
        };
        let reply = tokio::time::timeout(
            self.inner.relay_timeout,
            self.inner.relay.sign_message(&request),
        )
        .await
        .map_err(|_| ClientError::RelayTimeout(self.inner.relay_timeout))??;

        if let Some(error) = reply.error.filter(|e| !e.is_null()) {
            return Err(ClientError::Wallet(
                error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()),
            ));
        }
        match (reply.account_id, reply.public_key, reply.signature) {
            (Some(account_id), Some(public_key), Some(signature)) => Ok(SignedMessage {
                account_id,
                public_key,
                signature,
            }),
            _ => Err(ClientError::Wallet("wallet returned an incomplete signature".to_string())),
        }
    }

    /// Call a contract view method.
    pub async fn view(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &Value,
        block: BlockReference,
    ) -> ClientResult<Value> {
        let rpc = self.inner.session.load().rpc.clone();
        Ok(rpc.call_function(contract_id, method_name, args, block).await?)
    }

    pub async fn query_account(&self, account_id: &str, block: BlockReference) -> ClientResult<Value> {
        let rpc = self.inner.session.load().rpc.clone();
        Ok(rpc.view_account(account_id, block).await?)
    }

    pub async fn query_access_key(
        &self,
        account_id: &str,
        public_key: &str,
        block: BlockReference,
    ) -> ClientResult<AccessKeyView> {
        let rpc = self.inner.session.load().rpc.clone();
        Ok(rpc.view_access_key(account_id, public_key, block).await?)
    }

    pub async fn query_block(&self, block: BlockReference) -> ClientResult<BlockHeaderView> {
        let rpc = self.inner.session.load().rpc.clone();
        Ok(rpc.block(block).await?)
    }

    pub async fn query_tx(&self, tx_hash: &str, account_id: &str) -> ClientResult<Value> {
        let rpc = self.inner.session.load().rpc.clone();
        Ok(rpc.query_tx(tx_hash, account_id).await?)
    }

    pub fn history(&self) -> TxHistory {
        self.inner.session.load().ledger.get_history()
    }

    pub fn tx(&self, tx_id: &str) -> Option<TxRecord> {
        self.inner.session.load().ledger.get(tx_id)
    }

    /// Listen for account changes. Survives network switches.
    pub fn on_account<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Option<String>) + Send + Sync + 'static,
    {
        self.inner.accounts.subscribe(callback)
    }

    /// Listen for every transaction record update. Survives network switches.
    pub fn on_tx<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TxRecord) + Send + Sync + 'static,
    {
        self.inner.txs.subscribe(callback)
    }

    /// The wallet relay channel used by this client.
    pub fn relay(&self) -> &WalletRelay {
        &self.inner.relay
    }
}

impl std::fmt::Debug for NearClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearClient")
            .field("network_id", &self.network_id())
            .field("mode", &self.inner.mode)
            .finish()
    }
}
