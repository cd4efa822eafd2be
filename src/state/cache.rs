//! Cached chain facts for local signing: access-key nonce and last known block.
//!
//! The nonce is stored together with the public key it belongs to, so a cached
//! value is never handed out for a different key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::types::CachedBlock;
use crate::storage::{StorageBackend, BLOCK_KEY, NONCE_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NonceEntry {
    public_key: String,
    nonce: u64,
}

/// Nonce and block cache persisted through a storage backend.
#[derive(Clone)]
pub struct ChainCache {
    storage: Arc<dyn StorageBackend>,
}

impl ChainCache {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Cached nonce for `public_key`.
    pub fn nonce(&self, public_key: &str) -> Option<u64> {
        self.read::<NonceEntry>(NONCE_KEY)
            .filter(|entry| entry.public_key == public_key)
            .map(|entry| entry.nonce)
    }

    /// Whether any nonce is cached, regardless of key.
    pub fn has_nonce(&self) -> bool {
        self.read::<NonceEntry>(NONCE_KEY).is_some()
    }

    pub fn set_nonce(&self, public_key: &str, nonce: u64) {
        self.write(
            NONCE_KEY,
            &NonceEntry {
                public_key: public_key.to_string(),
                nonce,
            },
        );
    }

    pub fn clear_nonce(&self) {
        self.remove(NONCE_KEY);
    }

    pub fn block(&self) -> Option<CachedBlock> {
        self.read(BLOCK_KEY)
    }

    pub fn set_block(&self, block: &CachedBlock) {
        self.write(BLOCK_KEY, block);
    }

    pub fn clear_block(&self) {
        self.remove(BLOCK_KEY);
    }

    /// Drop both nonce and block.
    pub fn clear(&self) {
        self.clear_nonce();
        self.clear_block();
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        match self.storage.load(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Ignoring malformed cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::error!(key, error = %e, "Failed to read chain cache");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(Into::into)
            .and_then(|v| self.storage.save(key, &v));
        if let Err(e) = result {
            tracing::error!(key, error = %e, "Failed to persist chain cache");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove(key) {
            tracing::error!(key, error = %e, "Failed to clear chain cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_nonce_is_scoped_to_key() {
        let cache = ChainCache::new(Arc::new(MemoryStorage::new()));
        cache.set_nonce("ed25519:A", 10);

        assert_eq!(cache.nonce("ed25519:A"), Some(10));
        assert_eq!(cache.nonce("ed25519:B"), None);
        assert!(cache.has_nonce());

        cache.clear_nonce();
        assert_eq!(cache.nonce("ed25519:A"), None);
    }

    #[test]
    fn test_clear_drops_block_and_nonce() {
        let cache = ChainCache::new(Arc::new(MemoryStorage::new()));
        cache.set_nonce("k", 1);
        cache.set_block(&CachedBlock {
            hash: "h".into(),
            timestamp_nanosec: 5,
        });
        assert!(cache.block().is_some());

        cache.clear();
        assert!(cache.block().is_none());
        assert!(!cache.has_nonce());
    }
}
