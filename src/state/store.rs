use async_trait::async_trait;

use crate::events::Subscription;
use crate::state::cache::ChainCache;
use crate::state::types::{SessionState, StateError};

/// Listener invoked with each new session snapshot.
pub type StateListener = Box<dyn Fn(&SessionState) + Send + Sync>;

/// Holder of the current session for one network.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Network this store is scoped to.
    fn network_id(&self) -> &str;

    /// Current session. Read failures are logged and reported as `None`.
    async fn get_state(&self) -> Option<SessionState>;

    /// Replace the session. Listeners run before this returns.
    async fn set_state(&self, state: SessionState) -> Result<(), StateError>;

    /// Sign out: clear the session and every cached chain fact.
    async fn clear_state(&self) -> Result<(), StateError>;

    /// Register a listener. It fires once immediately if a session exists.
    fn subscribe(&self, listener: StateListener) -> Subscription;

    /// Nonce and block cache for this network.
    fn chain_cache(&self) -> &ChainCache;
}
