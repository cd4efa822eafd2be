//! Session state and cached chain facts.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;
use crate::transaction::{public_key_from_private, KeyPair};

/// The authenticated identity the client acts as.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub account_id: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    pub network_id: String,
    #[serde(default)]
    pub last_wallet_id: Option<String>,
    #[serde(default)]
    pub access_key_contract_id: Option<String>,
}

impl SessionState {
    /// Signed-out state for a network.
    pub fn empty(network_id: impl Into<String>) -> Self {
        Self {
            account_id: None,
            public_key: None,
            private_key: None,
            network_id: network_id.into(),
            last_wallet_id: None,
            access_key_contract_id: None,
        }
    }

    /// Enforce the derived-field invariants.
    ///
    /// `public_key` always equals the key derived from `private_key` (or is `None`).
    /// Without an account, key material and the scoped contract are dropped together.
    pub fn normalized(mut self) -> Self {
        if self.account_id.is_none() {
            self.private_key = None;
            self.access_key_contract_id = None;
        }

        self.public_key = match self.private_key.as_deref().map(public_key_from_private) {
            Some(Ok(public_key)) => Some(public_key),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Discarding unparsable private key from session");
                self.private_key = None;
                None
            }
            None => None,
        };
        self
    }

    pub fn is_signed_in(&self) -> bool {
        self.account_id.is_some()
    }

    /// Key pair for local signing, if the session holds a usable one.
    pub fn signing_key(&self) -> Option<KeyPair> {
        self.private_key
            .as_deref()
            .and_then(|secret| KeyPair::from_secret(secret).ok())
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("network_id", &self.network_id)
            .field("last_wallet_id", &self.last_wallet_id)
            .field("access_key_contract_id", &self.access_key_contract_id)
            .finish()
    }
}

/// Recent block used as the signing reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBlock {
    pub hash: String,
    pub timestamp_nanosec: u64,
}

impl CachedBlock {
    /// Whether the block is still within `window_ms` of `now_ms`.
    pub fn is_fresh(&self, now_ms: u64, window_ms: u64) -> bool {
        let block_ms = self.timestamp_nanosec / 1_000_000;
        block_ms.saturating_add(window_ms) >= now_ms
    }
}

/// Errors raised by state stores.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("external state source failed: {0}")]
    External(String),

    #[error("state for network '{got}' written to store for '{expected}'")]
    NetworkMismatch { expected: String, got: String },
}
