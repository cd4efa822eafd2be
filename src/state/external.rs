//! Adapter over a session source owned by the host application.
//!
//! Reads poll the source; writes go through it and then notify listeners.
//! Cached chain facts are kept in process memory only.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::events::{Subscribers, Subscription};
use crate::state::cache::ChainCache;
use crate::state::store::{StateListener, StateStore};
use crate::state::types::{SessionState, StateError};
use crate::storage::MemoryStorage;

/// Error type returned by host-provided sources.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Session persistence supplied by the host.
#[async_trait]
pub trait ExternalStateSource: Send + Sync {
    async fn get_state(&self) -> Result<Option<SessionState>, SourceError>;
    async fn set_state(&self, state: SessionState) -> Result<(), SourceError>;
    async fn clear_state(&self) -> Result<(), SourceError>;
}

pub struct ExternalStateStore {
    network_id: String,
    source: Arc<dyn ExternalStateSource>,
    last_seen: RwLock<Option<SessionState>>,
    subscribers: Subscribers<SessionState>,
    cache: ChainCache,
}

impl ExternalStateStore {
    /// Wrap `source`, reading its current session once.
    pub async fn connect(source: Arc<dyn ExternalStateSource>, network_id: &str) -> Self {
        let store = Self {
            network_id: network_id.to_string(),
            source,
            last_seen: RwLock::new(None),
            subscribers: Subscribers::new("session"),
            cache: ChainCache::new(Arc::new(MemoryStorage::new())),
        };
        store.get_state().await;
        store
    }

    fn snapshot(&self) -> Option<SessionState> {
        self.last_seen.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Record the latest known session, dropping the nonce if the key moved.
    fn observe(&self, state: Option<SessionState>) {
        let previous_key = self.snapshot().and_then(|s| s.private_key);
        let next_key = state.as_ref().and_then(|s| s.private_key.clone());
        if previous_key != next_key {
            self.cache.clear_nonce();
        }
        *self.last_seen.write().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

#[async_trait]
impl StateStore for ExternalStateStore {
    fn network_id(&self) -> &str {
        &self.network_id
    }

    async fn get_state(&self) -> Option<SessionState> {
        match self.source.get_state().await {
            Ok(state) => {
                let state = state.map(SessionState::normalized);
                self.observe(state.clone());
                state
            }
            Err(e) => {
                tracing::error!(
                    network_id = %self.network_id,
                    error = %e,
                    "External state source read failed; serving last known session"
                );
                self.snapshot()
            }
        }
    }

    async fn set_state(&self, state: SessionState) -> Result<(), StateError> {
        let state = state.normalized();
        self.source
            .set_state(state.clone())
            .await
            .map_err(|e| StateError::External(e.to_string()))?;

        self.observe(Some(state.clone()));
        self.subscribers.notify(&state);
        Ok(())
    }

    async fn clear_state(&self) -> Result<(), StateError> {
        self.source
            .clear_state()
            .await
            .map_err(|e| StateError::External(e.to_string()))?;

        self.observe(None);
        self.cache.clear();
        self.subscribers.notify(&SessionState::empty(&self.network_id));
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
