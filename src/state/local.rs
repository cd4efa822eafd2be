//! Store that owns its persistence: durable (file) or volatile (memory).

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::events::{Subscribers, Subscription};
use crate::state::cache::ChainCache;
use crate::state::store::{StateListener, StateStore};
use crate::state::types::{SessionState, StateError};
use crate::storage::{FileStorage, MemoryStorage, StorageBackend, SESSION_KEY};

pub struct LocalStateStore {
    network_id: String,
    storage: Arc<dyn StorageBackend>,
    current: RwLock<Option<SessionState>>,
    subscribers: Subscribers<SessionState>,
    cache: ChainCache,
}

impl LocalStateStore {
    /// File-backed store under `<dir>/<network_id>/`.
    pub fn durable(dir: impl AsRef<Path>, network_id: &str) -> Result<Self, StateError> {
        let storage = FileStorage::new(dir, network_id)?;
        Ok(Self::with_storage(network_id, Arc::new(storage)))
    }

    /// Process-local store; nothing is shared with other instances.
    pub fn volatile(network_id: &str) -> Self {
        Self::with_storage(network_id, Arc::new(MemoryStorage::new()))
    }

    /// Store over an arbitrary backend. Any persisted session is loaded now.
    pub fn with_storage(network_id: &str, storage: Arc<dyn StorageBackend>) -> Self {
        let initial = load_session(storage.as_ref(), network_id)
            .unwrap_or_else(|| SessionState::empty(network_id));

        Self {
            network_id: network_id.to_string(),
            cache: ChainCache::new(storage.clone()),
            storage,
            current: RwLock::new(Some(initial)),
            subscribers: Subscribers::new("session"),
        }
    }

    /// Backend shared with the ledger for this network.
    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        self.storage.clone()
    }

    fn snapshot(&self) -> Option<SessionState> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn replace(&self, state: SessionState) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(state);
    }
}

fn load_session(storage: &dyn StorageBackend, network_id: &str) -> Option<SessionState> {
    let value = match storage.load(SESSION_KEY) {
        Ok(value) => value?,
        Err(e) => {
            tracing::error!(network_id, error = %e, "Failed to read persisted session");
            return None;
        }
    };

    match serde_json::from_value::<SessionState>(value) {
        Ok(state) if state.network_id == network_id => Some(state.normalized()),
        Ok(state) => {
            tracing::warn!(
                network_id,
                stored = %state.network_id,
                "Ignoring persisted session for another network"
            );
            None
        }
        Err(e) => {
            tracing::warn!(network_id, error = %e, "Ignoring malformed persisted session");
            None
        }
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    async fn get_state(&self) -> Option<SessionState> {
        self.snapshot()
    }

    async fn set_state(&self, state: SessionState) -> Result<(), StateError> {
        if state.network_id != self.network_id {
            return Err(StateError::NetworkMismatch {
                expected: self.network_id.clone(),
                got: state.network_id,
            });
        }
        let state = state.normalized();

        let value = serde_json::to_value(&state).map_err(crate::storage::StorageError::from)?;
        self.storage.save(SESSION_KEY, &value)?;

        let previous_key = self.snapshot().and_then(|s| s.private_key);
        if previous_key != state.private_key {
            self.cache.clear_nonce();
        }

        self.replace(state.clone());
        tracing::debug!(
            network_id = %self.network_id,
            account_id = ?state.account_id,
            "Session updated"
        );
        self.subscribers.notify(&state);
        Ok(())
    }

    async fn clear_state(&self) -> Result<(), StateError> {
        self.storage.remove(SESSION_KEY)?;
        self.cache.clear();

        let empty = SessionState::empty(&self.network_id);
        self.replace(empty.clone());
        tracing::info!(network_id = %self.network_id, "Session cleared");
        self.subscribers.notify(&empty);
        Ok(())
    }

    fn subscribe(&self, listener: StateListener) -> Subscription {
        if let Some(state) = self.snapshot() {
            self.subscribers.deliver_one(&*listener, &state);
        }
        self.subscribers.subscribe(listener)
    }

    fn chain_cache(&self) -> &ChainCache {
        &self.cache
    }
}

impl std::fmt::Debug for LocalStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStateStore")
            .field("network_id", &self.network_id)
            .field("current", &self.snapshot())
            .finish()
    }
}
