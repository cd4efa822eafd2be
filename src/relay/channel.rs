use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::protocol::{
    InboundMessage, RelayEnvelope, RelayMethod, RelayReply, SendTransactionsReply,
    SendTransactionsRequest, SignInReply, SignInRequest, SignMessageReply, SignMessageRequest,
};
use crate::relay::surface::{SurfaceHandle, WalletSurface};
use crate::relay::RelayError;

/// Invoked with the merged session view whenever a reply carries `payload.state`.
/// The correlated request resolves only after the returned future completes.
pub type StateUpdateCallback = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

type Completion = oneshot::Sender<Result<Value, RelayError>>;

struct ActiveSurface {
    request_id: String,
    handle: Box<dyn SurfaceHandle>,
}

struct RelayInner {
    widget_url: Url,
    target_origin: String,
    callback_url: Option<String>,
    surface: Arc<dyn WalletSurface>,
    inbox: mpsc::UnboundedSender<InboundMessage>,
    pending: DashMap<String, Completion>,
    active: Mutex<Option<ActiveSurface>>,
    state: RwLock<Map<String, Value>>,
    on_state_update: Option<StateUpdateCallback>,
    destroyed: AtomicBool,
}

/// Correlated request/response channel to the wallet surface.
///
/// One surface and one request are live at a time. Starting a request
/// supersedes the previous one, which fails with [`RelayError::Superseded`].
pub struct WalletRelay {
    inner: Arc<RelayInner>,
    listener: JoinHandle<()>,
}

impl WalletRelay {
    /// Create the channel and spawn its inbox listener. Requires a Tokio runtime.
    pub fn new(
        config: &RelayConfig,
        surface: Arc<dyn WalletSurface>,
        on_state_update: Option<StateUpdateCallback>,
    ) -> Result<Self, RelayError> {
        let widget_url = Url::parse(&config.widget_url)
            .map_err(|e| RelayError::InvalidUrl(format!("{}: {e}", config.widget_url)))?;
        let (inbox, inbox_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(RelayInner {
            widget_url,
            target_origin: config.target_origin.clone(),
            callback_url: config.callback_url.clone(),
            surface,
            inbox,
            pending: DashMap::new(),
            active: Mutex::new(None),
            state: RwLock::new(Map::new()),
            on_state_update,
            destroyed: AtomicBool::new(false),
        });

        let listener = tokio::spawn(listen(inner.clone(), inbox_rx));
        Ok(Self { inner, listener })
    }

    pub async fn sign_in(&self, request: &SignInRequest) -> Result<SignInReply, RelayError> {
        self.typed(RelayMethod::SignIn, request).await
    }

    pub async fn send_transactions(
        &self,
        request: &SendTransactionsRequest,
    ) -> Result<SendTransactionsReply, RelayError> {
        self.typed(RelayMethod::SendTransactions, request).await
    }

    pub async fn sign_message(
        &self,
        request: &SignMessageRequest,
    ) -> Result<SignMessageReply, RelayError> {
        self.typed(RelayMethod::SignMessage, request).await
    }

    /// Cached session view sent with every request.
    pub fn state(&self) -> Value {
        Value::Object(self.inner.state.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Replace the cached session view. Non-object values clear it.
    pub fn set_state(&self, state: Value) {
        let map = match state {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        *self.inner.state.write().unwrap_or_else(|e| e.into_inner()) = map;
    }

    /// Fail every in-flight request with [`RelayError::Cancelled`].
    pub fn reject_pending(&self) {
        self.inner.fail_pending(|| RelayError::Cancelled);
        self.inner.close_active();
    }

    /// Number of requests awaiting a reply.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Whether a surface is currently open.
    pub fn has_active_surface(&self) -> bool {
        self.inner.lock_active().is_some()
    }

    /// Stop listening and fail every in-flight request. Later requests fail with `Closed`.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.abort();
        self.inner.fail_pending(|| RelayError::Closed);
        self.inner.close_active();
        tracing::debug!("Wallet relay destroyed");
    }

    async fn typed<P, R>(&self, method: RelayMethod, params: &P) -> Result<R, RelayError>
    where
        P: Serialize,
        R: DeserializeOwned + Default,
    {
        let params =
            serde_json::to_value(params).map_err(|e| RelayError::InvalidReply(e.to_string()))?;
        match self.request(method, params).await? {
            Value::Null => Ok(R::default()),
            payload => serde_json::from_value(payload)
                .map_err(|e| RelayError::InvalidReply(format!("{}: {e}", method.name()))),
        }
    }

    /// Run one correlated round trip and return the reply payload.
    ///
    /// Dropping the returned future withdraws the request and closes its surface.
    pub async fn request(&self, method: RelayMethod, params: Value) -> Result<Value, RelayError> {
        let inner = &self.inner;
        if inner.destroyed.load(Ordering::SeqCst) {
            return Err(RelayError::Closed);
        }

        let url = inner
            .widget_url
            .join(method.path())
            .map_err(|e| RelayError::InvalidUrl(e.to_string()))?;

        // One request in flight: the previous caller is told, not orphaned.
        inner.fail_pending(|| RelayError::Superseded);
        inner.close_active();

        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id.clone(), tx);
        let _guard = PendingGuard {
            inner: inner.clone(),
            id: id.clone(),
        };

        tracing::debug!(request_id = %id, method = method.name(), url = %url, "Opening wallet surface");
        let handle = inner.surface.open(url, inner.inbox.clone()).await?;

        if !inner.pending.contains_key(&id) {
            // Superseded or cancelled while the surface was loading.
            handle.close();
            return match rx.await {
                Ok(result) => result.map(|_| Value::Null),
                Err(_) => Err(RelayError::Closed),
            };
        }

        let envelope = RelayEnvelope::request(
            &id,
            method,
            params,
            self.state(),
            inner.callback_url.as_deref(),
        );
        // Registered before posting so a fast reply can close it.
        let post_result = {
            let mut active = inner.lock_active();
            let active = active.insert(ActiveSurface {
                request_id: id.clone(),
                handle,
            });
            active.handle.post(&envelope)
        };
        post_result?;
        metrics::record_relay_request(method.name());

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Closed),
        }
    }
}

impl Drop for WalletRelay {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for WalletRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRelay")
            .field("widget_url", &self.inner.widget_url.as_str())
            .field("target_origin", &self.inner.target_origin)
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl RelayInner {
    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveSurface>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close_active(&self) {
        if let Some(active) = self.lock_active().take() {
            active.handle.close();
        }
    }

    /// Close the surface only if it belongs to `request_id`.
    fn close_surface_for(&self, request_id: &str) {
        let mut active = self.lock_active();
        if active.as_ref().is_some_and(|a| a.request_id == request_id) {
            if let Some(active) = active.take() {
                active.handle.close();
            }
        }
    }

    fn fail_pending(&self, error: impl Fn() -> RelayError) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, completion)) = self.pending.remove(&id) {
                let err = error();
                tracing::debug!(request_id = %id, reason = %err, "Failing pending wallet request");
                let _ = completion.send(Err(err));
            }
        }
    }

    async fn handle_inbound(&self, message: InboundMessage) {
        if self.target_origin != "*" && message.origin != self.target_origin {
            tracing::debug!(origin = %message.origin, "Ignoring message from unexpected origin");
            return;
        }
        let Some(reply) = RelayReply::parse(&message.data) else {
            return;
        };

        if reply.is_close() {
            tracing::debug!("Wallet surface requested close");
            self.close_active();
            return;
        }

        if let Some(update) = reply.state() {
            let merged = {
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                for (key, value) in update {
                    state.insert(key.clone(), value.clone());
                }
                Value::Object(state.clone())
            };
            if let Some(callback) = &self.on_state_update {
                callback(merged).await;
            }
        }

        let Some(id) = reply.id else {
            return;
        };
        if let Some((_, completion)) = self.pending.remove(&id) {
            self.close_active();
            tracing::debug!(request_id = %id, "Wallet request resolved");
            let _ = completion.send(Ok(reply.payload.unwrap_or(Value::Null)));
        }
    }
}

async fn listen(inner: Arc<RelayInner>, mut inbox: mpsc::UnboundedReceiver<InboundMessage>) {
    while let Some(message) = inbox.recv().await {
        inner.handle_inbound(message).await;
    }
}

/// Removes a request's pending entry and surface when its caller goes away.
struct PendingGuard {
    inner: Arc<RelayInner>,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.inner.pending.remove(&self.id).is_some() {
            tracing::debug!(request_id = %self.id, "Wallet request abandoned");
        }
        self.inner.close_surface_for(&self.id);
    }
}
